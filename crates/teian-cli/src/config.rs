use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use teian_store::{DailyAt, StoreOptions};

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "teian.toml";

/// Settings read from `teian.toml`. Every field is optional.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeianConfig {
    pub db_path: PathBuf,
    pub open_timeout_ms: u64,
    pub open_retry_interval_ms: u64,
    pub quota_cap_bytes: u64,
    /// Local time of the daily quota reset, `HH:MM:SS`.
    pub reset_at: String,
    /// `tracing_subscriber::EnvFilter` directive, used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for TeianConfig {
    fn default() -> Self {
        let store = StoreOptions::default();
        Self {
            db_path: PathBuf::from("teian.db"),
            open_timeout_ms: store.open_timeout.as_millis() as u64,
            open_retry_interval_ms: store.retry_interval.as_millis() as u64,
            quota_cap_bytes: store.quota_cap,
            reset_at: DailyAt::default().to_string(),
            log_filter: "info".into(),
        }
    }
}

impl TeianConfig {
    /// Read `path`, or `./teian.toml` if it exists, or fall back to defaults.
    ///
    /// An explicitly named file must exist.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.reset_at()?;
        anyhow::ensure!(
            self.open_retry_interval_ms > 0,
            "open_retry_interval_ms must be positive"
        );
        Ok(())
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            open_timeout: Duration::from_millis(self.open_timeout_ms),
            retry_interval: Duration::from_millis(self.open_retry_interval_ms),
            quota_cap: self.quota_cap_bytes,
        }
    }

    pub fn reset_at(&self) -> anyhow::Result<DailyAt> {
        Ok(self.reset_at.parse()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_store_defaults() {
        let c = TeianConfig::default();
        assert_eq!(c.store_options(), StoreOptions::default());
        assert_eq!(c.quota_cap_bytes, 10 * 1024 * 1024);
        assert_eq!(c.reset_at().unwrap(), DailyAt::new(4, 0, 0).unwrap());
        assert_eq!(c.db_path, PathBuf::from("teian.db"));
    }

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(TeianConfig::parse("").unwrap(), TeianConfig::default());
    }

    #[test]
    fn partial_file_overrides_only_given_keys() {
        let c = TeianConfig::parse(
            r#"
            db_path = "/var/lib/teian/teian.db"
            quota_cap_bytes = 1048576
            reset_at = "03:30"
            "#,
        )
        .unwrap();
        assert_eq!(c.db_path, PathBuf::from("/var/lib/teian/teian.db"));
        assert_eq!(c.store_options().quota_cap, 1 << 20);
        assert_eq!(c.reset_at().unwrap(), DailyAt::new(3, 30, 0).unwrap());
        assert_eq!(c.open_timeout_ms, 5000);
    }

    #[test]
    fn bad_reset_time_is_rejected() {
        assert!(TeianConfig::parse(r#"reset_at = "27:00:00""#).is_err());
    }

    #[test]
    fn zero_retry_interval_is_rejected() {
        assert!(TeianConfig::parse("open_retry_interval_ms = 0").is_err());
    }

    #[test]
    fn load_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("teian.toml");
        std::fs::write(&path, "log_filter = \"teian=debug\"\n").unwrap();
        let c = TeianConfig::load(Some(&path)).unwrap();
        assert_eq!(c.log_filter, "teian=debug");

        assert!(TeianConfig::load(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn toml_roundtrip() {
        let c = TeianConfig::default();
        let text = toml::to_string(&c).unwrap();
        assert_eq!(TeianConfig::parse(&text).unwrap(), c);
    }
}
