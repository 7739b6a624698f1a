use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

use logpct::config::AnalysisConfig;
use logpct::percentile::PercentileMethod;
use logpct::report::{render_table, Report};
#[cfg(feature = "timeseries")]
use logpct::bucket::BucketSpec;

#[derive(Parser, Debug)]
#[command(name = "logpct", version, about = "Percentile statistics over JSON fields embedded in log lines")]
#[cfg_attr(not(feature = "timeseries"), allow(dead_code))]
struct Cli {
    /// Log file to analyze.
    input: Option<PathBuf>,

    /// JSON config file; command line flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Numeric field to collect (default: duration).
    #[arg(long)]
    field: Option<String>,

    /// Keep only records whose serviceCode equals this value.
    #[arg(long = "service")]
    service: Option<String>,

    /// Keep only records whose errorCode matches this value.
    #[arg(long = "error-code")]
    error_code: Option<String>,

    /// Inclusive lower time bound (RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM`, ...).
    #[arg(long)]
    from: Option<String>,

    /// Inclusive upper time bound.
    #[arg(long)]
    to: Option<String>,

    /// Percentile list, e.g. "50, 90, 99, 99.9".
    #[arg(long, short = 'p')]
    percentiles: Option<String>,

    /// Picker: nearest | linear.
    #[arg(long, short = 'm')]
    method: Option<PercentileMethod>,

    /// Time series bucket width in minutes.
    #[arg(long = "bucket-minutes", allow_negative_numbers = true)]
    bucket_minutes: Option<f64>,

    /// Percentile picked per time bucket.
    #[arg(long = "bucket-percentile", allow_negative_numbers = true)]
    bucket_percentile: Option<f64>,

    /// Extra time series as MINUTES:PERCENTILE. May be repeated.
    #[arg(long = "series")]
    series: Vec<String>,

    /// Output format: json | table | auto
    #[arg(long = "format", default_value = "auto")]
    format: String,

    /// Logging verbosity (trace, debug, info, warn, error).
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Cli {
    fn resolve_config(&self) -> Result<AnalysisConfig> {
        let mut cfg = match &self.config {
            Some(path) => AnalysisConfig::load(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => AnalysisConfig::default(),
        };
        if let Some(v) = &self.field { cfg.field = v.clone(); }
        if let Some(v) = &self.service { cfg.service_code = v.clone(); }
        if let Some(v) = &self.error_code { cfg.error_code = v.clone(); }
        if let Some(v) = &self.from { cfg.from = v.clone(); }
        if let Some(v) = &self.to { cfg.to = v.clone(); }
        if let Some(v) = &self.percentiles { cfg.percentiles = v.clone(); }
        if let Some(v) = self.method { cfg.method = v; }
        if let Some(v) = self.bucket_minutes { cfg.bucket_minutes = v; }
        if let Some(v) = self.bucket_percentile { cfg.bucket_percentile = v; }
        Ok(cfg)
    }
}

#[cfg(feature = "timeseries")]
fn parse_series(s: &str) -> BucketSpec {
    let (w, p) = s.split_once(':').unwrap_or((s, ""));
    BucketSpec::new(
        w.trim().parse().unwrap_or(f64::NAN),
        p.trim().parse().unwrap_or(f64::NAN),
    )
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level)
        .with_context(|| format!("invalid log level: {}", cli.log_level))?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(false).init();

    let cfg = cli.resolve_config()?;
    let analysis = logpct::analyze_file(cli.input.as_deref(), &cfg)?;
    tracing::info!(
        lines = analysis.counters.total_lines,
        matched = analysis.counters.total_matched,
        valid = analysis.counters.total_valid,
        "analysis finished"
    );

    #[allow(unused_mut)]
    let mut report = Report::new(&analysis);

    #[cfg(feature = "timeseries")]
    {
        // The default series stays quiet about bad settings unless the user asked for it.
        let explicit = cli.bucket_minutes.is_some() || cli.bucket_percentile.is_some();
        let primary = BucketSpec::new(cfg.bucket_minutes, cfg.bucket_percentile);
        let result = analysis.time_series(primary);
        if let Err(e) = &result {
            if explicit {
                tracing::warn!("{e}");
            }
        }
        report.push_series(primary, result);

        for raw in &cli.series {
            let spec = parse_series(raw);
            let result = analysis.time_series(spec);
            if let Err(e) = &result {
                tracing::warn!(series = %raw, "{e}");
            }
            report.push_series(spec, result);
        }
    }

    let as_table = match cli.format.as_str() {
        "table" => true,
        "json" => false,
        _ => atty::is(atty::Stream::Stdout),
    };
    if as_table {
        print!("{}", render_table(&report));
    } else {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}
