use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::AnalysisConfig;
use crate::extract::{extract_json, Record};
use crate::percentile::{nearest_rank, parse_percentiles, round6, PercentileMethod};
use crate::timestamp::{extract_timestamp_ms, parse_date_ms};

/// Group key for records without a usable `serviceCode`.
pub const UNKNOWN_GROUP: &str = "unknown";

const SERVICE_KEY: &str = "serviceCode";
const ERROR_KEY: &str = "errorCode";

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("no input file selected")]
    MissingInput,
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    /// Non-blank lines in the input.
    pub total_lines: usize,
    /// Lines that yielded a JSON object.
    pub total_matched: usize,
    /// Records that passed every filter and carried a numeric field.
    pub total_valid: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub ts: i64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    pub key: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuartileBox {
    pub group: String,
    pub min: f64,
    pub q1: f64,
    pub q2: f64,
    pub q3: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentileRow {
    pub group: String,
    pub percentile: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MedianSummary {
    pub group: String,
    pub value: f64,
}

/// Record predicates resolved once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    pub service_code: Option<String>,
    pub error_code: Option<String>,
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
}

impl Filters {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            service_code: non_empty(&config.service_code),
            error_code: non_empty(&config.error_code),
            from_ms: parse_bound(&config.from),
            to_ms: parse_bound(&config.to),
        }
    }

    fn admits_service(&self, rec: &Record) -> bool {
        match &self.service_code {
            Some(svc) => matches!(rec.get(SERVICE_KEY), Some(Value::String(s)) if s == svc),
            None => true,
        }
    }

    fn admits_error(&self, rec: &Record) -> bool {
        match &self.error_code {
            Some(code) => js_string(rec.get(ERROR_KEY)) == *code,
            None => true,
        }
    }

    /// Records without a resolvable timestamp are never excluded by the bounds.
    fn admits_time(&self, ts: Option<i64>) -> bool {
        let Some(ts) = ts else { return true };
        if matches!(self.from_ms, Some(from) if ts < from) {
            return false;
        }
        if matches!(self.to_ms, Some(to) if ts > to) {
            return false;
        }
        true
    }
}

/// Parse a user supplied time bound. Blank or unparseable input is unbounded.
pub fn parse_bound(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    parse_date_ms(s)
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() { None } else { Some(t.to_string()) }
}

/// Outcome of one pass over a file. Every derived collection is rebuilt from
/// scratch on each run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub counters: RunCounters,
    pub method: PercentileMethod,
    pub percentiles: Vec<f64>,
    /// Array-index keys (`"2"`, `"10"`) first in numeric order, then the
    /// remaining keys in first-seen order. Values sorted ascending.
    pub groups: Vec<Group>,
    pub boxes: Vec<QuartileBox>,
    pub rows: Vec<PercentileRow>,
    pub medians: Vec<MedianSummary>,
    /// Filtered points with a resolved timestamp, in file order.
    #[serde(skip)]
    pub timeline: Vec<TimelinePoint>,
}

impl Analysis {
    pub fn group(&self, key: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.key == key)
    }

    pub fn rows_for(&self, key: &str) -> impl Iterator<Item = &PercentileRow> + '_ {
        let key = key.to_string();
        self.rows.iter().filter(move |r| r.group == key)
    }
}

pub fn analyze_file(path: Option<&Path>, config: &AnalysisConfig) -> Result<Analysis, AnalysisError> {
    let path = path.ok_or(AnalysisError::MissingInput)?;
    let bytes = std::fs::read(path).map_err(|source| AnalysisError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8_lossy(&bytes);
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "loaded input");
    Ok(analyze_text(&text, config))
}

pub fn analyze_text(text: &str, config: &AnalysisConfig) -> Analysis {
    let lines: Vec<&str> = text
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect();

    let mut counters = RunCounters {
        total_lines: lines.iter().filter(|l| !l.trim().is_empty()).count(),
        ..Default::default()
    };

    let field = config.field_name();
    let filters = Filters::from_config(config);
    let percentiles = parse_percentiles(&config.percentiles);
    let method = config.method;

    let mut groups: Vec<Group> = Vec::new();
    let mut index: AHashMap<String, usize> = AHashMap::new();
    let mut timeline: Vec<TimelinePoint> = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let Some(rec) = extract_json(line) else {
            tracing::trace!(line = i + 1, "no JSON object");
            continue;
        };
        counters.total_matched += 1;
        if !filters.admits_service(&rec) || !filters.admits_error(&rec) {
            continue;
        }
        let ts = extract_timestamp_ms(&rec);
        if !filters.admits_time(ts) {
            continue;
        }
        let value = js_number(rec.get(field));
        if !value.is_finite() {
            tracing::trace!(line = i + 1, field, "field is not numeric");
            continue;
        }
        let key = group_key(&rec);
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(Group { key, values: Vec::new() });
            groups.len() - 1
        });
        groups[slot].values.push(value);
        counters.total_valid += 1;
        if let Some(ts) = ts {
            timeline.push(TimelinePoint { ts, value });
        }
    }

    order_groups(&mut groups);

    let mut boxes = Vec::with_capacity(groups.len());
    let mut rows = Vec::with_capacity(groups.len() * percentiles.len());
    let mut medians = Vec::new();
    for g in groups.iter_mut() {
        g.values.sort_by(|a, b| a.total_cmp(b));
        let vals = &g.values;
        boxes.push(QuartileBox {
            group: g.key.clone(),
            min: vals[0],
            q1: nearest_rank(vals, 25.0),
            q2: nearest_rank(vals, 50.0),
            q3: nearest_rank(vals, 75.0),
            max: vals[vals.len() - 1],
        });
        for &p in &percentiles {
            let v = method.pick(vals, p);
            rows.push(PercentileRow { group: g.key.clone(), percentile: p, value: round6(v) });
            if p == 50.0 {
                medians.push(MedianSummary { group: g.key.clone(), value: v });
            }
        }
    }

    tracing::debug!(
        total_lines = counters.total_lines,
        total_matched = counters.total_matched,
        total_valid = counters.total_valid,
        groups = groups.len(),
        timeline = timeline.len(),
        %method,
        "analysis pass complete"
    );

    Analysis { counters, method, percentiles, groups, boxes, rows, medians, timeline }
}

/// Stable reorder: canonical array-index keys ascend ahead of every other key.
fn order_groups(groups: &mut [Group]) {
    groups.sort_by_key(|g| match array_index(&g.key) {
        Some(i) => (false, i),
        None => (true, 0),
    });
}

/// `Some(n)` for a canonical decimal `u32` below `u32::MAX` with no leading zeros.
fn array_index(key: &str) -> Option<u32> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if key.len() > 1 && key.starts_with('0') {
        return None;
    }
    key.parse::<u32>().ok().filter(|n| *n != u32::MAX)
}

/// `serviceCode` when it is a non-empty string, otherwise the textual form of
/// any other truthy value, otherwise [`UNKNOWN_GROUP`].
fn group_key(rec: &Record) -> String {
    let Some(v) = rec.get(SERVICE_KEY) else {
        return UNKNOWN_GROUP.to_string();
    };
    let truthy = match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    };
    if truthy { js_string(Some(v)) } else { UNKNOWN_GROUP.to_string() }
}

/// Loose string conversion used for `errorCode` comparison.
fn js_string(v: Option<&Value>) -> String {
    match v {
        None => "undefined".to_string(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => i.to_string(),
            (_, Some(u)) => u.to_string(),
            _ => n.as_f64().map(|f| f.to_string()).unwrap_or_default(),
        },
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => js_string(Some(other)),
            })
            .collect::<Vec<_>>()
            .join(","),
        Some(Value::Object(_)) => "[object Object]".to_string(),
    }
}

/// Loose numeric coercion of a field value; NaN when it has no numeric reading.
fn js_number(v: Option<&Value>) -> f64 {
    match v {
        None | Some(Value::Object(_)) => f64::NAN,
        Some(Value::Null) => 0.0,
        Some(Value::Bool(b)) => if *b { 1.0 } else { 0.0 },
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => string_to_number(s),
        Some(Value::Array(_)) => string_to_number(&js_string(v)),
    }
}

fn string_to_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}
