//! Query parameter substitution
//!
//! Replaces `{name}` placeholders in NRQL text with caller-supplied values.

use crate::error::{Error, Result};
use crate::types::StringMap;
use regex::Regex;
use std::sync::LazyLock;

/// Placeholders look like `{since}` or `{app_name}`
static PARAM_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-zA-Z]\w*)\}").unwrap());

/// Substitute every placeholder in `nrql`
///
/// All undefined names are reported together.
pub fn render_nrql(nrql: &str, params: &StringMap) -> Result<String> {
    let mut missing: Vec<String> = Vec::new();

    let rendered = PARAM_REGEX.replace_all(nrql, |caps: &regex::Captures<'_>| {
        let name = caps.get(1).map_or("", |m| m.as_str());
        match params.get(name) {
            Some(value) => value.clone(),
            None => {
                missing.push(name.to_string());
                caps[0].to_string()
            }
        }
    });

    if missing.is_empty() {
        Ok(rendered.into_owned())
    } else {
        missing.dedup();
        Err(Error::undefined_var(missing.join(", ")))
    }
}

/// Placeholder names in order of appearance
pub fn extract_params(nrql: &str) -> Vec<String> {
    PARAM_REGEX
        .captures_iter(nrql)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}
