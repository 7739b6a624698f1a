use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::analysis::{Analysis, TimelinePoint};
use crate::percentile::{round6, PercentileMethod};

const MS_PER_MINUTE: f64 = 60_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum BucketError {
    #[error("bucket width must be greater than 0 minutes (got {0})")]
    InvalidWidth(f64),
    #[error("bucket percentile must be in (0, 100] (got {0})")]
    InvalidPercentile(f64),
}

/// Width and percentile for one time series view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketSpec {
    pub width_minutes: f64,
    pub percentile: f64,
}

impl BucketSpec {
    pub fn new(width_minutes: f64, percentile: f64) -> Self {
        Self { width_minutes, percentile }
    }

    pub fn validate(&self) -> Result<(), BucketError> {
        if !self.width_minutes.is_finite() || self.width_minutes <= 0.0 {
            return Err(BucketError::InvalidWidth(self.width_minutes));
        }
        if !self.percentile.is_finite() || self.percentile <= 0.0 || self.percentile > 100.0 {
            return Err(BucketError::InvalidPercentile(self.percentile));
        }
        Ok(())
    }

    fn width_ms(&self) -> f64 {
        self.width_minutes * MS_PER_MINUTE
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeBucket {
    pub start_ms: i64,
    pub label: String,
    pub value: f64,
    pub count: usize,
}

/// Start of the window containing `ts`; floors toward negative infinity.
pub fn bucket_start(ts: i64, width_ms: f64) -> i64 {
    ((ts as f64 / width_ms).floor() * width_ms) as i64
}

/// Re-group the timeline into fixed windows and pick one percentile per window.
///
/// Buckets come back in ascending start order. An empty timeline yields an
/// empty series; an invalid spec is an error and nothing is computed.
pub fn bucket_timeline(
    timeline: &[TimelinePoint],
    spec: BucketSpec,
    method: PercentileMethod,
) -> Result<Vec<TimeBucket>, BucketError> {
    spec.validate()?;
    if timeline.is_empty() {
        return Ok(Vec::new());
    }
    let width_ms = spec.width_ms();
    let mut windows: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
    for point in timeline {
        windows.entry(bucket_start(point.ts, width_ms)).or_default().push(point.value);
    }

    let buckets: Vec<TimeBucket> = windows
        .into_iter()
        .filter_map(|(start, mut vals)| {
            vals.sort_by(|a, b| a.total_cmp(b));
            let value = round6(method.pick(&vals, spec.percentile));
            if !value.is_finite() {
                return None;
            }
            Some(TimeBucket { start_ms: start, label: format_bucket_label(start), value, count: vals.len() })
        })
        .collect();
    tracing::debug!(
        width_minutes = spec.width_minutes,
        percentile = spec.percentile,
        points = timeline.len(),
        buckets = buckets.len(),
        "time series computed"
    );
    Ok(buckets)
}

/// `DD/MM HH:MM` in local time.
pub fn format_bucket_label(start_ms: i64) -> String {
    format_bucket_label_in(start_ms, &Local)
}

pub fn format_bucket_label_in<Tz: TimeZone>(start_ms: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match tz.timestamp_millis_opt(start_ms).earliest() {
        Some(dt) => dt.format("%d/%m %H:%M").to_string(),
        None => String::new(),
    }
}

impl Analysis {
    /// Recompute a time series from the retained timeline with the run's picker.
    pub fn time_series(&self, spec: BucketSpec) -> Result<Vec<TimeBucket>, BucketError> {
        bucket_timeline(&self.timeline, spec, self.method)
    }
}
