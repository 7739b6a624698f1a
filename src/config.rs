use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::percentile::PercentileMethod;

pub const DEFAULT_FIELD: &str = "duration";
pub const DEFAULT_PERCENTILES: &str = "50, 80, 90, 95, 99, 99.5, 99.7";
pub const DEFAULT_BUCKET_MINUTES: f64 = 5.0;
pub const DEFAULT_BUCKET_PERCENTILE: f64 = 99.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Everything one analysis run consumes. Empty strings mean "no filter" or
/// "unbounded"; every field falls back to its default when missing from a
/// config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Record field holding the numeric sample.
    pub field: String,
    /// Exact `serviceCode` match.
    pub service_code: String,
    /// Match against the string form of `errorCode`.
    pub error_code: String,
    /// Inclusive lower time bound.
    pub from: String,
    /// Inclusive upper time bound.
    pub to: String,
    /// Free-text percentile list, e.g. `"50, 90, 99"`.
    pub percentiles: String,
    pub method: PercentileMethod,
    pub bucket_minutes: f64,
    pub bucket_percentile: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            field: DEFAULT_FIELD.to_string(),
            service_code: String::new(),
            error_code: String::new(),
            from: String::new(),
            to: String::new(),
            percentiles: DEFAULT_PERCENTILES.to_string(),
            method: PercentileMethod::default(),
            bucket_minutes: DEFAULT_BUCKET_MINUTES,
            bucket_percentile: DEFAULT_BUCKET_PERCENTILE,
        }
    }
}

impl AnalysisConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Field name with surrounding whitespace removed; blank falls back to the default.
    pub fn field_name(&self) -> &str {
        let f = self.field.trim();
        if f.is_empty() { DEFAULT_FIELD } else { f }
    }
}
