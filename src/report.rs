use itertools::Itertools;
use serde::Serialize;
use std::fmt::Write as _;

use crate::analysis::{Analysis, MedianSummary, PercentileRow, QuartileBox, RunCounters};
use crate::percentile::PercentileMethod;
#[cfg(feature = "timeseries")]
use crate::bucket::{BucketError, BucketSpec, TimeBucket};

/// Everything a renderer needs from one run, detached from the timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub counters: RunCounters,
    pub method: PercentileMethod,
    pub percentiles: Vec<f64>,
    pub boxes: Vec<QuartileBox>,
    pub rows: Vec<PercentileRow>,
    pub medians: Vec<MedianSummary>,
    #[cfg(feature = "timeseries")]
    pub time_series: Vec<SeriesOut>,
}

#[cfg(feature = "timeseries")]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesOut {
    pub width_minutes: f64,
    pub percentile: f64,
    pub buckets: Vec<TimeBucket>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Report {
    pub fn new(analysis: &Analysis) -> Self {
        Self {
            counters: analysis.counters,
            method: analysis.method,
            percentiles: analysis.percentiles.clone(),
            boxes: analysis.boxes.clone(),
            rows: analysis.rows.clone(),
            medians: analysis.medians.clone(),
            #[cfg(feature = "timeseries")]
            time_series: Vec::new(),
        }
    }

    /// Attach one series; a rejected spec is kept as an empty series with its reason.
    #[cfg(feature = "timeseries")]
    pub fn push_series(&mut self, spec: BucketSpec, result: Result<Vec<TimeBucket>, BucketError>) {
        let (buckets, error) = match result {
            Ok(b) => (b, None),
            Err(e) => (Vec::new(), Some(e.to_string())),
        };
        self.time_series.push(SeriesOut {
            width_minutes: spec.width_minutes,
            percentile: spec.percentile,
            buckets,
            error,
        });
    }
}

/// Plain-text rendering for terminals.
pub fn render_table(report: &Report) -> String {
    let mut out = String::new();
    let c = &report.counters;
    let _ = writeln!(
        out,
        "lines={} matched={} valid={} method={} percentiles=[{}]",
        c.total_lines,
        c.total_matched,
        c.total_valid,
        report.method,
        report.percentiles.iter().join(", ")
    );

    let _ = writeln!(out, "\n{:<20} {:>12} {:>12} {:>12} {:>12} {:>12}", "Group", "Min", "Q1", "Median", "Q3", "Max");
    for b in &report.boxes {
        let _ = writeln!(out, "{:<20} {:>12} {:>12} {:>12} {:>12} {:>12}", b.group, b.min, b.q1, b.q2, b.q3, b.max);
    }

    let _ = writeln!(out, "\n{:<20} {:>10} {:>16}", "Group", "Percentile", "Value");
    let mut current: Option<&str> = None;
    for r in &report.rows {
        let shown = if current == Some(r.group.as_str()) { "" } else { r.group.as_str() };
        current = Some(r.group.as_str());
        let _ = writeln!(out, "{:<20} {:>10} {:>16}", shown, format!("p{}", r.percentile), r.value);
    }

    #[cfg(feature = "timeseries")]
    for s in &report.time_series {
        let _ = writeln!(out, "\n# p{} per {} min", s.percentile, s.width_minutes);
        if let Some(err) = &s.error {
            let _ = writeln!(out, "({err})");
            continue;
        }
        let _ = writeln!(out, "{:<12} {:>16} {:>8}", "Bucket", "Value", "N");
        for b in &s.buckets {
            let _ = writeln!(out, "{:<12} {:>16} {:>8}", b.label, b.value, b.count);
        }
    }
    out
}
