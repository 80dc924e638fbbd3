//! Tests for query module

use super::*;
use crate::error::Error;
use crate::http::RawResponse;
use crate::test_support::{json_response, scripted_client, ScriptedTransport};
use crate::types::{Row, StringMap};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use test_case::test_case;

const BEGIN_MS: i64 = 1_700_000_000_000;
const END_MS: i64 = 1_700_003_600_000;
const WEEK_MS: i64 = 604_800_000;

fn include() -> Row {
    json!({"account_id": 42, "account_name": "Acme"})
        .as_object()
        .unwrap()
        .clone()
}

fn keys(row: &Row) -> Vec<&str> {
    row.keys().map(String::as_str).collect()
}

fn datetime(ms: i64) -> Value {
    Value::from(DecodeOptions::default().datetime(ms as f64))
}

fn decode_default(response: &Value) -> Decoded {
    decode(response, &include(), &DecodeOptions::default()).unwrap()
}

// ============================================================================
// Timestamp Conversion Tests
// ============================================================================

#[test]
fn test_spreadsheet_datetime() {
    assert_eq!(to_spreadsheet_datetime(0.0, SPREADSHEET_EPOCH_DAYS), 25569.0);
    assert_eq!(
        to_spreadsheet_datetime(86_400_000.0, SPREADSHEET_EPOCH_DAYS),
        25570.0
    );
    assert_eq!(to_spreadsheet_datetime(43_200_000.0, 0.0), 0.5);
}

#[test]
fn test_decode_options_default_and_serde() {
    let options = DecodeOptions::default();
    assert_eq!(options.epoch_offset_days, 25569.0);
    assert_eq!(options.collision_policy, CollisionPolicy::Suffix);

    let parsed: DecodeOptions = serde_yaml::from_str("collision_policy: reject").unwrap();
    assert_eq!(parsed.epoch_offset_days, 25569.0);
    assert_eq!(parsed.collision_policy, CollisionPolicy::Reject);
}

// ============================================================================
// Classifier Tests
// ============================================================================

#[test_case(json!({"contents": [{"function": "count"}]}), ShapeKind::Single ; "single")]
#[test_case(
    json!({"contents": [{"function": "events", "limit": 100, "order": {"column": "timestamp", "descending": true}}]}),
    ShapeKind::Events ; "events"
)]
#[test_case(
    json!({"facet": "appName", "contents": {"facet": "appName", "contents": [{"function": "count"}]}}),
    ShapeKind::Facets ; "facets"
)]
#[test_case(
    json!({"timeSeries": {"contents": [{"function": "count"}]}}),
    ShapeKind::Timeseries ; "timeseries"
)]
#[test_case(
    json!({"facet": "appName", "contents": {"timeSeries": {"contents": [{"function": "count"}]}}}),
    ShapeKind::FacetsTimeseries ; "facets timeseries"
)]
#[test_case(
    json!({"compareWith": WEEK_MS, "contents": {"contents": [{"function": "count"}]}}),
    ShapeKind::Compare ; "compare"
)]
#[test_case(
    json!({"compareWith": WEEK_MS, "contents": {"facet": "appName", "contents": {"contents": [{"function": "count"}]}}}),
    ShapeKind::CompareFacets ; "compare facets"
)]
#[test_case(
    json!({"compareWith": WEEK_MS, "contents": {"timeSeries": {"contents": [{"function": "count"}]}}}),
    ShapeKind::CompareTimeseries ; "compare timeseries"
)]
fn test_classify_shapes(metadata: Value, expected: ShapeKind) {
    let classification = classify(&metadata).unwrap();
    assert_eq!(classification.shape, expected);
    assert_eq!(expected.is_compare(), metadata.get("compareWith").is_some());
    if expected != ShapeKind::Events {
        assert_eq!(classification.contents, vec![ContentSpec::scalar("count", None)]);
    }
}

#[test]
fn test_classify_resolves_facets() {
    let single = json!({"facet": "appName", "contents": {"facet": "appName", "contents": []}});
    assert_eq!(
        classify(&single).unwrap().facet,
        FacetDescriptor::Single("appName".to_string())
    );

    let multi = json!({
        "compareWith": WEEK_MS,
        "contents": {"facet": ["appName", "host"], "contents": {"contents": []}}
    });
    assert_eq!(
        classify(&multi).unwrap().facet,
        FacetDescriptor::Multi(vec!["appName".to_string(), "host".to_string()])
    );

    let none = json!({"contents": [{"function": "count"}]});
    assert!(classify(&none).unwrap().facet.is_empty());
}

#[test_case(json!({"compareWith": 1, "contents": {}}), "metadata.contents.contents" ; "compare without nesting")]
#[test_case(json!({"timeSeries": {}}), "metadata.timeSeries.contents" ; "timeseries without contents")]
#[test_case(json!({"compareWith": 1, "contents": {"facet": "a", "contents": {}}}), "metadata.contents.contents.contents" ; "compare facets without nesting")]
#[test_case(json!({"contents": {"facet": "a", "contents": []}}), "metadata.facet" ; "facet only nested")]
#[test_case(json!({}), "metadata.contents" ; "no contents")]
#[test_case(json!({"contents": [{"attribute": "duration"}]}), "metadata.contents[0].function" ; "content without function")]
fn test_classify_malformed(metadata: Value, path: &str) {
    match classify(&metadata) {
        Err(Error::MalformedResponse { path: actual }) => assert_eq!(actual, path),
        other => panic!("Expected MalformedResponse, got {other:?}"),
    }
}

#[test]
fn test_content_spec_kinds() {
    let percentile = ContentSpec::from_value(
        &json!({"function": "percentile", "attribute": "duration", "thresholds": [50, 99.9]}),
        "c",
    )
    .unwrap();
    assert_eq!(
        percentile.kind,
        AggregateKind::PercentileSet {
            thresholds: vec!["50".to_string(), "99.9".to_string()]
        }
    );
    assert_eq!(percentile.width(), 2);

    let aliased = ContentSpec::from_value(
        &json!({"alias": "slow", "contents": {"function": "apdex", "attribute": "duration", "t": 0.5}}),
        "c",
    )
    .unwrap();
    assert_eq!(aliased.alias.as_deref(), Some("slow"));
    assert_eq!(aliased.kind, AggregateKind::Apdex);
    assert_eq!(aliased.width(), 5);

    let missing = ContentSpec::from_value(&json!({"function": "histogram", "start": 0}), "c");
    assert!(matches!(missing, Err(Error::MalformedResponse { path }) if path == "c.bucketSize"));
}

// ============================================================================
// Header Tests
// ============================================================================

fn header_for(contents: Value) -> Vec<String> {
    let specs: Vec<ContentSpec> = contents
        .as_array()
        .unwrap()
        .iter()
        .map(|c| ContentSpec::from_value(c, "c").unwrap())
        .collect();
    build_header(&specs, &FacetDescriptor::None, CollisionPolicy::Suffix)
        .unwrap()
        .columns
}

#[test]
fn test_header_default_naming() {
    let columns = header_for(json!([
        {"function": "count"},
        {"function": "average", "attribute": "duration"},
        {"alias": "slowest", "contents": {"function": "max", "attribute": "duration"}}
    ]));
    assert_eq!(columns, vec!["count", "average_duration", "slowest"]);
}

#[test]
fn test_header_percentile_thresholds() {
    let columns = header_for(json!([
        {"function": "percentile", "attribute": "duration", "thresholds": [50, 75, 90]}
    ]));
    assert_eq!(
        columns,
        vec!["percentile_duration_50", "percentile_duration_75", "percentile_duration_90"]
    );
}

#[test]
fn test_header_histogram_buckets() {
    let columns = header_for(json!([
        {"function": "histogram", "attribute": "duration", "start": 0, "bucketSize": 10, "bucketCount": 3}
    ]));
    assert_eq!(
        columns,
        vec![
            "histogram_duration_00.00_10.00",
            "histogram_duration_10.00_20.00",
            "histogram_duration_20.00_30.00"
        ]
    );

    let small = header_for(json!([
        {"function": "histogram", "attribute": "t", "start": 0.5, "bucketSize": 0.25, "bucketCount": 2}
    ]));
    assert_eq!(small, vec!["histogram_t_00.50_00.75", "histogram_t_00.75_01.00"]);
}

#[test]
fn test_header_funnel_and_apdex() {
    let columns = header_for(json!([
        {"function": "funnel", "attribute": "session", "steps": ["viewed cart", "checkout"]},
        {"function": "apdex", "attribute": "duration", "t": 0.5}
    ]));
    assert_eq!(
        columns,
        vec![
            "funnel_session_viewed_cart",
            "funnel_session_checkout",
            "apdex_duration_count",
            "apdex_duration_s",
            "apdex_duration_t",
            "apdex_duration_f",
            "apdex_duration_score"
        ]
    );
}

#[test]
fn test_header_rate_naming() {
    let columns = header_for(json!([
        {"function": "rate", "of": {"function": "count", "attribute": "appName"}},
        {"function": "rate", "of": {"function": "count"}},
        {"alias": "rpm", "contents": {"function": "rate", "of": {"function": "count", "attribute": "x"}}}
    ]));
    assert_eq!(columns, vec!["rate_count_appName", "rate_count", "rpm"]);
}

#[test]
fn test_header_facet_columns_first() {
    let specs = vec![ContentSpec::scalar("count", None)];
    let header = build_header(
        &specs,
        &FacetDescriptor::Multi(vec!["appName".to_string(), "host".to_string()]),
        CollisionPolicy::Suffix,
    )
    .unwrap();
    assert_eq!(header.columns, vec!["appName", "host", "count"]);
    assert_eq!(header.fact_offset, 2);
    assert_eq!(header.facet_columns().to_vec(), vec!["appName", "host"]);
    assert_eq!(header.value_columns().to_vec(), vec!["count"]);
}

#[test]
fn test_header_compared_keeps_facets() {
    let header = Header {
        columns: vec!["appName".to_string(), "a".to_string(), "b".to_string()],
        fact_offset: 1,
    };
    assert_eq!(
        header.compared().columns,
        vec!["appName", "a_compare", "b_compare"]
    );
}

#[test]
fn test_header_collision_policies() {
    let specs = vec![
        ContentSpec::scalar("average", Some("duration")),
        ContentSpec::scalar("average", Some("duration")),
        ContentSpec::scalar("average", Some("duration")),
    ];

    let suffixed = build_header(&specs, &FacetDescriptor::None, CollisionPolicy::Suffix).unwrap();
    assert_eq!(
        suffixed.columns,
        vec!["average_duration", "average_duration_2", "average_duration_3"]
    );

    let rejected = build_header(&specs, &FacetDescriptor::None, CollisionPolicy::Reject);
    assert!(
        matches!(rejected, Err(Error::HeaderCollision { column }) if column == "average_duration")
    );
}

// ============================================================================
// Decoder Tests
// ============================================================================

fn single_response() -> Value {
    json!({
        "results": [
            {"count": 42},
            {"percentiles": {"50": 1.5, "90": 3.5}},
            {"score": 0.9, "s": 8, "t": 1, "f": 1, "count": 10}
        ],
        "metadata": {
            "beginTimeMillis": BEGIN_MS,
            "endTimeMillis": END_MS,
            "contents": [
                {"function": "count"},
                {"function": "percentile", "attribute": "duration", "thresholds": [50, 90]},
                {"function": "apdex", "attribute": "duration", "t": 0.5}
            ]
        }
    })
}

#[test]
fn test_decode_single() {
    let decoded = decode_default(&single_response());
    assert_eq!(decoded.shape, ShapeKind::Single);
    assert_eq!(decoded.rows.len(), 1);

    let row = &decoded.rows[0];
    assert_eq!(
        keys(row),
        vec![
            "account_id",
            "account_name",
            "timewindow",
            "timestamp",
            "datetime",
            "count",
            "percentile_duration_50",
            "percentile_duration_90",
            "apdex_duration_count",
            "apdex_duration_s",
            "apdex_duration_t",
            "apdex_duration_f",
            "apdex_duration_score"
        ]
    );
    assert_eq!(row["timewindow"], json!(3_600_000));
    assert_eq!(row["timestamp"], json!(END_MS));
    assert_eq!(row["datetime"], datetime(END_MS));
    assert_eq!(row["count"], json!(42));
    assert_eq!(row["percentile_duration_50"], json!(1.5));
    assert_eq!(row["percentile_duration_90"], json!(3.5));
    assert_eq!(row["apdex_duration_count"], json!(10));
    assert_eq!(row["apdex_duration_s"], json!(8));
    assert_eq!(row["apdex_duration_score"], json!(0.9));
}

#[test]
fn test_decode_single_value_column_count() {
    let decoded = decode_default(&single_response());
    let row = &decoded.rows[0];
    let value_columns = decoded.header.value_columns();
    assert_eq!(value_columns.len(), 8);
    assert!(value_columns.iter().all(|column| row.contains_key(column)));
    assert_eq!(row.len(), include().len() + 3 + value_columns.len());
}

#[test]
fn test_decode_histogram_and_funnel_values() {
    let response = json!({
        "results": [{"histogram": [4, 5, 6]}, {"steps": [100, 20]}],
        "metadata": {
            "beginTimeMillis": BEGIN_MS,
            "endTimeMillis": END_MS,
            "contents": [
                {"function": "histogram", "attribute": "duration", "start": 0, "bucketSize": 10, "bucketCount": 3},
                {"function": "funnel", "attribute": "session", "steps": ["viewed cart", "checkout"]}
            ]
        }
    });
    let row = &decode_default(&response).rows[0];
    assert_eq!(row["histogram_duration_00.00_10.00"], json!(4));
    assert_eq!(row["histogram_duration_10.00_20.00"], json!(5));
    assert_eq!(row["histogram_duration_20.00_30.00"], json!(6));
    assert_eq!(row["funnel_session_viewed_cart"], json!(100));
    assert_eq!(row["funnel_session_checkout"], json!(20));
}

#[test]
fn test_decode_events() {
    let response = json!({
        "results": [{"events": [
            {"appName": "checkout", "timestamp": 86_400_000},
            {"appName": "search"}
        ]}],
        "metadata": {"contents": [{"function": "events", "limit": 100, "order": {"column": "timestamp"}}]}
    });
    let decoded = decode_default(&response);
    assert_eq!(decoded.shape, ShapeKind::Events);
    assert_eq!(decoded.rows.len(), 2);

    assert_eq!(
        keys(&decoded.rows[0]),
        vec!["account_id", "account_name", "appName", "timestamp", "datetime"]
    );
    assert_eq!(decoded.rows[0]["datetime"], json!(25570.0));
    assert_eq!(
        keys(&decoded.rows[1]),
        vec!["account_id", "account_name", "appName"]
    );
}

#[test]
fn test_decode_facets() {
    let response = json!({
        "facets": [
            {"name": ["checkout", "host-1"], "results": [{"count": 5}]},
            {"name": ["search", "host-2"], "results": [{"count": 3}]}
        ],
        "metadata": {
            "beginTimeMillis": BEGIN_MS,
            "endTimeMillis": END_MS,
            "facet": ["appName", "host"],
            "contents": {"facet": ["appName", "host"], "contents": [{"function": "count"}]}
        }
    });
    let decoded = decode_default(&response);
    assert_eq!(decoded.shape, ShapeKind::Facets);
    assert_eq!(decoded.header.fact_offset, 2);
    assert_eq!(decoded.rows.len(), 2);

    let row = &decoded.rows[1];
    assert_eq!(
        keys(row),
        vec![
            "account_id",
            "account_name",
            "timewindow",
            "timestamp",
            "datetime",
            "appName",
            "host",
            "count"
        ]
    );
    assert_eq!(row["appName"], json!("search"));
    assert_eq!(row["host"], json!("host-2"));
    assert_eq!(row["count"], json!(3));
}

fn bucket(begin: i64, count: i64) -> Value {
    json!({
        "results": [{"count": count}],
        "beginTimeSeconds": begin,
        "endTimeSeconds": begin + 60,
        "inspectedCount": count * 10
    })
}

#[test]
fn test_decode_timeseries() {
    let response = json!({
        "timeSeries": [bucket(1_700_000_000, 1), bucket(1_700_000_060, 2)],
        "metadata": {"timeSeries": {"contents": [{"function": "count"}]}}
    });
    let decoded = decode_default(&response);
    assert_eq!(decoded.shape, ShapeKind::Timeseries);
    assert_eq!(decoded.rows.len(), 2);

    let row = &decoded.rows[1];
    assert_eq!(
        keys(row),
        vec![
            "account_id",
            "account_name",
            "count",
            "inspectedCount",
            "timewindow",
            "timestamp",
            "datetime"
        ]
    );
    assert_eq!(row["count"], json!(2));
    assert_eq!(row["inspectedCount"], json!(20));
    assert_eq!(row["timewindow"], json!(60));
    assert_eq!(row["timestamp"], json!(1_700_000_120));
    assert_eq!(row["datetime"], datetime(1_700_000_120_000));
}

#[test]
fn test_decode_facets_timeseries_cartesian() {
    let group = |name: &str, base: i64| {
        json!({
            "name": name,
            "timeSeries": [bucket(base, 1), bucket(base + 60, 2), bucket(base + 120, 3)]
        })
    };
    let response = json!({
        "facets": [group("checkout", 1_700_000_000), group("search", 1_700_000_000)],
        "metadata": {
            "facet": "appName",
            "contents": {"timeSeries": {"contents": [{"function": "count"}]}}
        }
    });
    let decoded = decode_default(&response);
    assert_eq!(decoded.shape, ShapeKind::FacetsTimeseries);
    assert_eq!(decoded.rows.len(), 6);

    let names: Vec<&str> = decoded
        .rows
        .iter()
        .map(|row| row["appName"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec!["checkout", "checkout", "checkout", "search", "search", "search"]
    );
    let counts: Vec<Value> = decoded.rows.iter().map(|row| row["count"].clone()).collect();
    assert_eq!(counts, vec![json!(1), json!(2), json!(3), json!(1), json!(2), json!(3)]);
}

#[test]
fn test_decode_compare() {
    let response = json!({
        "current": {"results": [{"count": 10}, {"average": 1.5}]},
        "previous": {"results": [{"count": 8}, {"average": 2.5}]},
        "metadata": {
            "compareWith": WEEK_MS,
            "beginTimeMillis": BEGIN_MS,
            "endTimeMillis": END_MS,
            "contents": {"contents": [
                {"alias": "a", "contents": {"function": "count"}},
                {"alias": "b", "contents": {"function": "average", "attribute": "duration"}}
            ]}
        }
    });
    let decoded = decode_default(&response);
    assert_eq!(decoded.shape, ShapeKind::Compare);
    assert_eq!(decoded.header.columns, vec!["a", "b"]);
    assert_eq!(decoded.rows.len(), 1);

    let row = &decoded.rows[0];
    assert_eq!(
        keys(row),
        vec![
            "account_id",
            "account_name",
            "timewindow",
            "timestamp",
            "datetime",
            "timestamp_compare",
            "datetime_compare",
            "a",
            "b",
            "a_compare",
            "b_compare"
        ]
    );
    assert_eq!(row["a"], json!(10));
    assert_eq!(row["b_compare"], json!(2.5));
    assert_eq!(row["timestamp_compare"], json!(BEGIN_MS - WEEK_MS));
    assert_eq!(row["datetime_compare"], datetime(BEGIN_MS - WEEK_MS));
}

#[test]
fn test_decode_compare_facets() {
    let response = json!({
        "current": {"facets": [
            {"name": "checkout", "results": [{"count": 10}]},
            {"name": "search", "results": [{"count": 4}]}
        ]},
        "previous": {"facets": [
            {"name": "checkout", "results": [{"count": 7}]},
            {"name": "search", "results": [{"count": 5}]}
        ]},
        "metadata": {
            "compareWith": WEEK_MS,
            "beginTimeMillis": BEGIN_MS,
            "endTimeMillis": END_MS,
            "contents": {"facet": "appName", "contents": {"contents": [{"function": "count"}]}}
        }
    });
    let decoded = decode_default(&response);
    assert_eq!(decoded.shape, ShapeKind::CompareFacets);
    assert_eq!(decoded.rows.len(), 2);

    let row = &decoded.rows[0];
    assert_eq!(row["appName"], json!("checkout"));
    assert_eq!(row["count"], json!(10));
    assert_eq!(row["count_compare"], json!(7));
    assert!(!row.contains_key("appName_compare"));
    assert_eq!(decoded.rows[1]["count_compare"], json!(5));
}

#[test]
fn test_decode_compare_timeseries() {
    let response = json!({
        "current": {"timeSeries": [bucket(1_700_000_000, 3), bucket(1_700_000_060, 4)]},
        "previous": {"timeSeries": [bucket(1_699_395_200, 1), bucket(1_699_395_260, 2)]},
        "metadata": {
            "compareWith": WEEK_MS,
            "contents": {"timeSeries": {"contents": [{"function": "count"}]}}
        }
    });
    let decoded = decode_default(&response);
    assert_eq!(decoded.shape, ShapeKind::CompareTimeseries);
    assert_eq!(decoded.rows.len(), 2);

    let row = &decoded.rows[0];
    assert_eq!(
        keys(row),
        vec![
            "account_id",
            "account_name",
            "count",
            "inspectedCount",
            "timewindow",
            "timestamp",
            "datetime",
            "count_compare",
            "inspectedCount_compare",
            "timewindow_compare",
            "timestamp_compare",
            "datetime_compare"
        ]
    );
    assert_eq!(row["count"], json!(3));
    assert_eq!(row["count_compare"], json!(1));
    assert_eq!(row["timestamp_compare"], json!(1_699_395_260));
}

#[test_case(json!({}) ; "empty object")]
#[test_case(json!([]) ; "empty array")]
#[test_case(Value::Null ; "null")]
#[test_case(json!({"results": [], "metadata": {"contents": [{"function": "count"}]}}) ; "single without results")]
#[test_case(json!({"facets": [], "metadata": {"facet": "a", "contents": {"facet": "a", "contents": [{"function": "count"}]}}}) ; "no facet groups")]
#[test_case(json!({"metadata": {"timeSeries": {"contents": [{"function": "count"}]}}}) ; "timeseries absent")]
#[test_case(json!({"current": {"results": []}, "previous": {"results": []}, "metadata": {"compareWith": 1, "contents": {"contents": [{"function": "count"}]}}}) ; "compare without results")]
fn test_decode_empty_results(response: Value) {
    let rows = decode_response(&response, &include(), &DecodeOptions::default()).unwrap();
    assert!(rows.is_empty());
}

#[test]
fn test_decode_missing_result_entry_is_malformed() {
    let mut response = single_response();
    response["results"].as_array_mut().unwrap().pop();

    let result = decode_response(&response, &include(), &DecodeOptions::default());
    assert!(matches!(result, Err(Error::MalformedResponse { path }) if path == "results[2]"));
}

#[test]
fn test_decode_short_percentile_map_is_malformed() {
    let mut response = single_response();
    response["results"][1] = json!({"percentiles": {"50": 1.5}});

    let result = decode_response(&response, &include(), &DecodeOptions::default());
    assert!(matches!(result, Err(Error::MalformedResponse { .. })));
}

#[test]
fn test_decode_missing_metadata_is_malformed() {
    let result = decode_response(&json!({"results": [{"count": 1}]}), &Row::new(), &DecodeOptions::default());
    assert!(matches!(result, Err(Error::MalformedResponse { path }) if path == "metadata"));
}

#[test]
fn test_decode_is_idempotent() {
    let response = single_response();
    let first = decode_response(&response, &include(), &DecodeOptions::default()).unwrap();
    let second = decode_response(&response, &include(), &DecodeOptions::default()).unwrap();
    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
}

#[test]
fn test_decode_custom_epoch() {
    let options = DecodeOptions {
        epoch_offset_days: 0.0,
        ..Default::default()
    };
    let rows = decode_response(&single_response(), &Row::new(), &options).unwrap();
    assert_eq!(rows[0]["datetime"], json!(END_MS as f64 / 86_400_000.0));
}

#[test]
fn test_decode_far_future_bucket() {
    let end = 9_300_000_000_000_000_i64;
    let response = json!({
        "timeSeries": [{
            "results": [{"count": 1}],
            "inspectedCount": 1,
            "beginTimeSeconds": 0,
            "endTimeSeconds": end
        }],
        "metadata": {"timeSeries": {"contents": [{"function": "count"}]}}
    });
    let rows = decode_response(&response, &Row::new(), &DecodeOptions::default()).unwrap();
    assert_eq!(rows[0]["timewindow"], json!(end));
    assert!(rows[0]["datetime"].as_f64().unwrap().is_finite());
}

#[test_case(json!({
    "timeSeries": [{
        "results": [{"count": 1}],
        "inspectedCount": 1,
        "beginTimeSeconds": i64::MIN,
        "endTimeSeconds": i64::MAX
    }],
    "metadata": {"timeSeries": {"contents": [{"function": "count"}]}}
}), "timeSeries[0].endTimeSeconds" ; "bucket window")]
#[test_case(json!({
    "results": [{"count": 1}],
    "metadata": {
        "beginTimeMillis": i64::MIN,
        "endTimeMillis": i64::MAX,
        "contents": [{"function": "count"}]
    }
}), "metadata.endTimeMillis" ; "query window")]
#[test_case(json!({
    "current": {"results": [{"count": 1}]},
    "previous": {"results": [{"count": 1}]},
    "metadata": {
        "compareWith": i64::MAX,
        "beginTimeMillis": -BEGIN_MS,
        "endTimeMillis": END_MS,
        "contents": {"contents": [{"function": "count"}]}
    }
}), "metadata.compareWith" ; "compare offset")]
fn test_decode_overflowing_window_is_malformed(response: Value, expected: &str) {
    let result = decode_response(&response, &Row::new(), &DecodeOptions::default());
    assert!(matches!(result, Err(Error::MalformedResponse { path }) if path == expected));
}

// ============================================================================
// Query Client Tests
// ============================================================================

fn client_for(transport: &std::sync::Arc<ScriptedTransport>) -> QueryClient {
    QueryClient::new(scripted_client(transport), QueryApiConfig::new("123", "NRIQ-key")).unwrap()
}

#[tokio::test]
async fn test_query_client_sends_query() {
    let transport = ScriptedTransport::new(|_, _| Ok(json_response(&single_response())));
    let client = client_for(&transport);

    let mut params = StringMap::new();
    params.insert("since".to_string(), "1 day ago".to_string());

    let outcome = client
        .events("SELECT count(*) FROM Transaction SINCE {since}", &include(), &params)
        .await
        .unwrap();
    let rows = outcome.into_data().unwrap();
    assert_eq!(rows.len(), 1);

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].url,
        "https://insights-api.newrelic.com/v1/accounts/123/query"
    );
    assert_eq!(
        requests[0].query.get("nrql").map(String::as_str),
        Some("SELECT count(*) FROM Transaction SINCE 1 day ago")
    );
    assert_eq!(
        requests[0].headers.get("X-Query-Key").map(String::as_str),
        Some("NRIQ-key")
    );
}

#[tokio::test]
async fn test_query_client_unavailable_is_distinct_from_empty() {
    let transport = ScriptedTransport::new(|_, _| Ok(RawResponse::new(500, "oops")));
    let client = client_for(&transport);

    let outcome = client
        .events("SELECT count(*) FROM Transaction", &Row::new(), &StringMap::new())
        .await
        .unwrap();
    assert!(matches!(outcome, QueryOutcome::Unavailable { attempts: 5, .. }));
    assert_eq!(transport.calls(), 5);

    let empty = ScriptedTransport::new(|_, _| {
        Ok(json_response(&json!({"results": [], "metadata": {"contents": [{"function": "count"}]}})))
    });
    let outcome = client_for(&empty)
        .events("SELECT count(*) FROM Transaction", &Row::new(), &StringMap::new())
        .await
        .unwrap();
    assert_eq!(outcome, QueryOutcome::Data(Vec::new()));
}

#[test_case(Vec::new() ; "empty body")]
#[test_case(b"  \n".to_vec() ; "whitespace body")]
#[tokio::test]
async fn test_query_client_blank_body_is_empty_result(body: Vec<u8>) {
    let transport = ScriptedTransport::new(move |_, _| Ok(RawResponse::new(200, body.clone())));

    let outcome = client_for(&transport)
        .events("SELECT count(*) FROM Transaction", &Row::new(), &StringMap::new())
        .await
        .unwrap();
    assert_eq!(outcome, QueryOutcome::Data(Vec::new()));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_query_client_undefined_param_sends_nothing() {
    let transport = ScriptedTransport::new(|_, _| Ok(json_response(&single_response())));
    let client = client_for(&transport);

    let result = client
        .query("SELECT count(*) FROM {eventType}", &StringMap::new())
        .await;
    assert!(matches!(result, Err(Error::UndefinedVariable { .. })));
    assert_eq!(transport.calls(), 0);
}

#[test]
fn test_query_client_requires_credentials() {
    let transport = ScriptedTransport::new(|_, _| Ok(RawResponse::new(200, "{}")));
    let result = QueryClient::new(scripted_client(&transport), QueryApiConfig::new("", "key"));
    assert!(matches!(result, Err(Error::MissingConfigField { field }) if field == "account_id"));
}
