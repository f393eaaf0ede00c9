use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Tunables for the export subsystem. Defaults match the documented
/// limits; `from_env` lets deployments override them.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Directory holding in-flight and completed export files.
    pub export_dir: PathBuf,
    /// Hard ceiling on bytes written per export.
    pub max_file_size_bytes: u64,
    /// Advisory threshold for low-confidence estimates.
    pub caution_threshold_bytes: u64,
    /// Wall-clock deadline for one export, measured from its start.
    pub timeout: Duration,
    /// Pending plus running tasks allowed per owner.
    pub max_concurrent_per_owner: usize,
    /// How long task records and files are kept.
    pub retention: Duration,
    /// Pause between retention sweeps.
    pub sweep_interval: Duration,
    /// Rows between worker checkpoints.
    pub progress_rows: u64,
    /// Maximum time between worker checkpoints.
    pub progress_interval: Duration,
    /// Rows pulled for sample-based size estimation.
    pub sample_size: usize,
    /// Extrapolation factor applied to a sample when the total row count
    /// is unknown. Deliberately conservative.
    pub unknown_rows_multiplier: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            export_dir: env::temp_dir().join("dbexport"),
            max_file_size_bytes: 100 * 1024 * 1024,
            caution_threshold_bytes: 50 * 1024 * 1024,
            timeout: Duration::from_secs(300),
            max_concurrent_per_owner: 3,
            retention: Duration::from_secs(7 * 24 * 3600),
            sweep_interval: Duration::from_secs(3600),
            progress_rows: 500,
            progress_interval: Duration::from_secs(1),
            sample_size: 100,
            unknown_rows_multiplier: 1000,
        }
    }
}

impl ExportConfig {
    /// Build a config from `EXPORT_*` environment variables, falling back
    /// to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = env::var("EXPORT_TEMP_DIR") {
            config.export_dir = PathBuf::from(dir);
        }
        if let Some(mb) = parse_var::<u64>("EXPORT_MAX_FILE_SIZE_MB") {
            config.max_file_size_bytes = mb * 1024 * 1024;
        }
        if let Some(mb) = parse_var::<u64>("EXPORT_CAUTION_THRESHOLD_MB") {
            config.caution_threshold_bytes = mb * 1024 * 1024;
        }
        if let Some(secs) = parse_var::<u64>("EXPORT_TIMEOUT_SECONDS") {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(n) = parse_var::<usize>("EXPORT_MAX_CONCURRENT_PER_USER") {
            config.max_concurrent_per_owner = n;
        }
        if let Some(days) = parse_var::<u64>("EXPORT_RETENTION_DAYS") {
            config.retention = Duration::from_secs(days * 24 * 3600);
        }
        if let Some(secs) = parse_var::<u64>("EXPORT_SWEEP_INTERVAL_SECONDS") {
            config.sweep_interval = Duration::from_secs(secs);
        }
        if let Some(n) = parse_var::<usize>("EXPORT_SAMPLE_SIZE") {
            config.sample_size = n;
        }
        if let Some(n) = parse_var::<u64>("EXPORT_UNKNOWN_ROWS_MULTIPLIER") {
            config.unknown_rows_multiplier = n;
        }

        config
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExportConfig::default();

        assert_eq!(config.max_file_size_bytes, 100 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert_eq!(config.max_concurrent_per_owner, 3);
        assert_eq!(config.retention, Duration::from_secs(7 * 24 * 3600));
        assert_eq!(config.progress_rows, 500);
    }
}
