pub mod extract;
pub mod timestamp;
pub mod percentile;
pub mod config;
pub mod analysis;
#[cfg(feature = "timeseries")]
pub mod bucket;
pub mod report;

pub use analysis::{analyze_file, analyze_text, Analysis, AnalysisError};
pub use config::AnalysisConfig;
pub use percentile::PercentileMethod;
