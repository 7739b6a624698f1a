use std::io::Write;

use logpct::analysis::{analyze_file, analyze_text, AnalysisError, UNKNOWN_GROUP};
use logpct::{AnalysisConfig, PercentileMethod};

const THREE_LINES: &str = concat!(
    r#"{"serviceCode":"A","duration":10}"#, "\n",
    r#"{"serviceCode":"A","duration":20}"#, "\n",
    r#"{"serviceCode":"A","duration":"#, "\n",
);

fn config(method: PercentileMethod) -> AnalysisConfig {
    AnalysisConfig { method, ..Default::default() }
}

#[test]
fn end_to_end_linear_median() {
    let a = analyze_text(THREE_LINES, &config(PercentileMethod::Linear));
    assert_eq!(a.counters.total_lines, 3);
    assert_eq!(a.counters.total_matched, 2);
    assert_eq!(a.counters.total_valid, 2);
    assert_eq!(a.group("A").unwrap().values, vec![10.0, 20.0]);
    let median = a.rows_for("A").find(|r| r.percentile == 50.0).unwrap();
    assert_eq!(median.value, 15.0);
    assert_eq!(a.medians.len(), 1);
    assert_eq!(a.medians[0].group, "A");
    assert_eq!(a.medians[0].value, 15.0);
}

#[test]
fn end_to_end_nearest_rank_median() {
    let a = analyze_text(THREE_LINES, &config(PercentileMethod::Nearest));
    let median = a.rows_for("A").find(|r| r.percentile == 50.0).unwrap();
    // ceil(0.5 * 2) = 1 -> first element
    assert_eq!(median.value, 10.0);
}

#[test]
fn rows_follow_percentile_list_per_group() {
    let a = analyze_text(THREE_LINES, &config(PercentileMethod::Nearest));
    let ps: Vec<f64> = a.rows_for("A").map(|r| r.percentile).collect();
    assert_eq!(ps, vec![50.0, 80.0, 90.0, 95.0, 99.0, 99.5, 99.7]);
    assert!(a.rows_for("A").skip(1).all(|r| r.value == 20.0));
}

#[test]
fn blank_lines_do_not_count_as_lines() {
    let text = "\n   \r\n{\"duration\":1}\r\n\nplain text\n";
    let a = analyze_text(text, &AnalysisConfig::default());
    assert_eq!(a.counters.total_lines, 2);
    assert_eq!(a.counters.total_matched, 1);
    assert_eq!(a.counters.total_valid, 1);
    assert_eq!(a.group(UNKNOWN_GROUP).unwrap().values, vec![1.0]);
}

#[test]
fn quartile_box_uses_nearest_rank_regardless_of_method() {
    let text: String = (1..=8)
        .map(|i| format!("{{\"serviceCode\":\"S\",\"duration\":{}}}\n", i * 10))
        .collect();
    let a = analyze_text(&text, &config(PercentileMethod::Linear));
    let b = &a.boxes[0];
    assert_eq!((b.min, b.q1, b.q2, b.q3, b.max), (10.0, 20.0, 40.0, 60.0, 80.0));
    // the picker still follows the configured method
    let median = a.rows_for("S").find(|r| r.percentile == 50.0).unwrap();
    assert_eq!(median.value, 45.0);
}

#[test]
fn values_are_sorted_and_groups_keep_first_seen_order() {
    let text = [
        r#"{"serviceCode":"B","duration":30}"#,
        r#"{"serviceCode":"A","duration":5}"#,
        r#"{"serviceCode":"B","duration":10}"#,
        r#"{"duration":7}"#,
        r#"{"serviceCode":"B","duration":20}"#,
    ]
    .join("\n");
    let a = analyze_text(&text, &AnalysisConfig::default());
    let keys: Vec<&str> = a.groups.iter().map(|g| g.key.as_str()).collect();
    assert_eq!(keys, vec!["B", "A", UNKNOWN_GROUP]);
    assert_eq!(a.group("B").unwrap().values, vec![10.0, 20.0, 30.0]);
}

#[test]
fn numeric_service_codes_come_first_in_ascending_order() {
    let text = [
        r#"{"serviceCode":"B","duration":1}"#,
        r#"{"serviceCode":"10","duration":2}"#,
        r#"{"serviceCode":"2","duration":3}"#,
        r#"{"serviceCode":"007","duration":4}"#,
        r#"{"serviceCode":"A","duration":5}"#,
    ]
    .join("\n");
    let a = analyze_text(&text, &AnalysisConfig::default());
    let keys: Vec<&str> = a.groups.iter().map(|g| g.key.as_str()).collect();
    assert_eq!(keys, vec!["2", "10", "B", "007", "A"]);
    let box_keys: Vec<&str> = a.boxes.iter().map(|b| b.group.as_str()).collect();
    assert_eq!(box_keys, keys);
    let median_keys: Vec<&str> = a.medians.iter().map(|m| m.group.as_str()).collect();
    assert_eq!(median_keys, keys);
    assert_eq!(a.rows[0].group, "2");
}

#[test]
fn service_filter_is_exact_string_match() {
    let text = [
        r#"{"serviceCode":"PAY","duration":1}"#,
        r#"{"serviceCode":"PAYMENTS","duration":2}"#,
        r#"{"serviceCode":"pay","duration":3}"#,
        r#"{"duration":4}"#,
    ]
    .join("\n");
    let cfg = AnalysisConfig { service_code: " PAY ".into(), ..Default::default() };
    let a = analyze_text(&text, &cfg);
    assert_eq!(a.counters.total_matched, 4);
    assert_eq!(a.counters.total_valid, 1);
    assert_eq!(a.group("PAY").unwrap().values, vec![1.0]);
}

#[test]
fn error_filter_compares_string_forms() {
    let text = [
        r#"{"errorCode":500,"duration":1}"#,
        r#"{"errorCode":"500","duration":2}"#,
        r#"{"errorCode":"0500","duration":3}"#,
        r#"{"duration":4}"#,
    ]
    .join("\n");
    let cfg = AnalysisConfig { error_code: "500".into(), ..Default::default() };
    let a = analyze_text(&text, &cfg);
    assert_eq!(a.group(UNKNOWN_GROUP).unwrap().values, vec![1.0, 2.0]);
}

#[test]
fn time_window_is_inclusive_and_passes_records_without_timestamp() {
    let text = [
        r#"{"timestamp":"2024-01-01T00:00:00Z","duration":1}"#,
        r#"{"timestamp":"2024-01-01T01:00:00Z","duration":2}"#,
        r#"{"timestamp":"2024-01-01T02:00:00Z","duration":3}"#,
        r#"{"timestamp":"2024-01-01T03:00:00Z","duration":4}"#,
        r#"{"duration":5}"#,
        r#"{"timestamp":"not a date","duration":6}"#,
    ]
    .join("\n");
    let cfg = AnalysisConfig {
        from: "2024-01-01T01:00:00Z".into(),
        to: "2024-01-01T02:00:00Z".into(),
        ..Default::default()
    };
    let a = analyze_text(&text, &cfg);
    assert_eq!(a.group(UNKNOWN_GROUP).unwrap().values, vec![2.0, 3.0, 5.0, 6.0]);
    // only resolved timestamps reach the timeline
    let ts: Vec<i64> = a.timeline.iter().map(|p| p.ts).collect();
    assert_eq!(ts, vec![1_704_070_800_000, 1_704_074_400_000]);
}

#[test]
fn unparseable_bound_is_unbounded() {
    let text = r#"{"timestamp":1700000000,"duration":1}"#;
    let cfg = AnalysisConfig { from: "sometime".into(), ..Default::default() };
    let a = analyze_text(text, &cfg);
    assert_eq!(a.counters.total_valid, 1);
}

#[test]
fn non_numeric_field_values_are_dropped_silently() {
    let text = [
        r#"{"duration":"12.5"}"#,
        r#"{"duration":"fast"}"#,
        r#"{"duration":{"ms":3}}"#,
        r#"{"latency":9}"#,
        r#"{"duration":1e400}"#,
    ]
    .join("\n");
    let a = analyze_text(&text, &AnalysisConfig::default());
    assert_eq!(a.counters.total_lines, 5);
    // an out-of-range literal still decodes; only the coercion rejects it
    assert_eq!(a.counters.total_matched, 5);
    assert_eq!(a.counters.total_valid, 1);
    assert_eq!(a.group(UNKNOWN_GROUP).unwrap().values, vec![12.5]);
}

#[test]
fn custom_field_is_collected() {
    let text = r#"{"serviceCode":"A","latency":"  42 ","duration":1}"#;
    let cfg = AnalysisConfig { field: " latency ".into(), ..Default::default() };
    let a = analyze_text(text, &cfg);
    assert_eq!(a.group("A").unwrap().values, vec![42.0]);
}

#[test]
fn no_median_rows_without_p50() {
    let cfg = AnalysisConfig { percentiles: "90, 99".into(), ..Default::default() };
    let a = analyze_text(THREE_LINES, &cfg);
    assert!(a.medians.is_empty());
    assert_eq!(a.rows.len(), 2);
}

#[test]
fn row_values_are_rounded_to_six_decimals() {
    let text = [r#"{"duration":0.1}"#, r#"{"duration":0.2}"#, r#"{"duration":0.3}"#].join("\n");
    let cfg = AnalysisConfig {
        percentiles: "33".into(),
        method: PercentileMethod::Linear,
        ..Default::default()
    };
    let a = analyze_text(&text, &cfg);
    // pos = 0.66 -> 0.1 + 0.66 * 0.1
    assert_eq!(a.rows[0].value, 0.166);
}

#[test]
fn missing_input_is_reported() {
    let err = analyze_file(None, &AnalysisConfig::default()).unwrap_err();
    assert!(matches!(err, AnalysisError::MissingInput));
}

#[test]
fn unreadable_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.log");
    let err = analyze_file(Some(&path), &AnalysisConfig::default()).unwrap_err();
    assert!(matches!(err, AnalysisError::Read { .. }));
}

#[test]
fn reads_file_from_disk() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(THREE_LINES.as_bytes()).unwrap();
    let a = analyze_file(Some(f.path()), &config(PercentileMethod::Linear)).unwrap();
    assert_eq!(a.counters.total_matched, 2);
    assert_eq!(a.medians[0].value, 15.0);
}
