use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

static RE_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ ,]+").unwrap());

/// Parse a free-text percentile list such as `"50, 90, 99.5"`.
///
/// Tokens that are not finite numbers strictly inside (0, 100) are dropped.
/// Input order and duplicates are preserved.
pub fn parse_percentiles(s: &str) -> Vec<f64> {
    RE_SEPARATORS
        .split(s)
        .filter_map(|tok| tok.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v > 0.0 && *v < 100.0)
        .collect()
}

/// Nearest-rank percentile over an ascending slice. Always returns an element
/// of `sorted`, or NaN when it is empty.
pub fn nearest_rank(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    let rank = ((p / 100.0) * n as f64).ceil();
    let idx = (rank - 1.0).clamp(0.0, (n - 1) as f64) as usize;
    sorted[idx]
}

/// Linear interpolation between the two closest ranks over an ascending slice.
pub fn linear_interp(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    let pos = (p / 100.0) * (n - 1) as f64;
    let lo = pos.floor();
    let hi = pos.ceil();
    if hi >= n as f64 {
        return sorted[n - 1];
    }
    let (lo_i, hi_i) = (lo.max(0.0) as usize, hi.max(0.0) as usize);
    let frac = pos - lo;
    sorted[lo_i] + frac * (sorted[hi_i] - sorted[lo_i])
}

/// Round to 6 decimal places, half away from zero on the exact decimal value
/// of `v` (ties go to the larger magnitude).
pub fn round6(v: f64) -> f64 {
    if !v.is_finite() || v.abs() >= 1e21 {
        return v;
    }
    // f64 has at most 1074 fractional digits, so this expansion is exact.
    let exact = format!("{:.1100}", v.abs());
    let (int_part, frac) = exact.split_once('.').unwrap_or((exact.as_str(), ""));
    let mut digits: Vec<u8> = int_part.bytes().chain(frac.bytes().take(6)).collect();
    if frac.as_bytes().get(6).map_or(false, |d| *d >= b'5') {
        increment_decimal(&mut digits);
    }
    let split = digits.len() - 6;
    let text: String = digits[..split]
        .iter()
        .chain(b".")
        .chain(&digits[split..])
        .map(|&b| char::from(b))
        .collect();
    match text.parse::<f64>() {
        Ok(r) if r == 0.0 => 0.0,
        Ok(r) => r.copysign(v),
        Err(_) => v,
    }
}

fn increment_decimal(digits: &mut Vec<u8>) {
    for d in digits.iter_mut().rev() {
        if *d == b'9' {
            *d = b'0';
        } else {
            *d += 1;
            return;
        }
    }
    digits.insert(0, b'1');
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PercentileMethod {
    #[default]
    Nearest,
    Linear,
}

impl PercentileMethod {
    pub fn pick(self, sorted: &[f64], p: f64) -> f64 {
        match self {
            PercentileMethod::Nearest => nearest_rank(sorted, p),
            PercentileMethod::Linear => linear_interp(sorted, p),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PercentileMethod::Nearest => "nearest",
            PercentileMethod::Linear => "linear",
        }
    }
}

impl fmt::Display for PercentileMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown percentile method `{0}` (expected nearest | linear)")]
pub struct UnknownMethod(pub String);

impl FromStr for PercentileMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(PercentileMethod::Nearest),
            "linear" => Ok(PercentileMethod::Linear),
            other => Err(UnknownMethod(other.to_string())),
        }
    }
}
