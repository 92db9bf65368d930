use chrono_tz::Tz;
use serde::Deserialize;

use crate::scheduler::{DEFAULT_INTERVAL_MINUTES, parse_interval};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

fn default_port() -> u16 {
    5000
}

fn default_host() -> String {
    "0.0.0.0".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// CSV sample log; created with a header row on first start.
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> String {
    "load_time_log.csv".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    /// Minutes between sweeps at startup. Changeable at runtime via the API.
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u32,
    /// IANA timezone name used for sample and log timestamps.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Targets measured from the first sweep on. Duplicates are dropped.
    #[serde(default = "default_targets")]
    pub targets: Vec<String>,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            timezone: default_timezone(),
            targets: default_targets(),
        }
    }
}

impl MonitoringConfig {
    pub fn tz(&self) -> anyhow::Result<Tz> {
        self.timezone
            .trim()
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("monitoring.timezone {:?}: {}", self.timezone, e))
    }
}

fn default_interval_minutes() -> u32 {
    DEFAULT_INTERVAL_MINUTES
}

fn default_timezone() -> String {
    "UTC".into()
}

fn default_targets() -> Vec<String> {
    vec!["https://lex.ao".into()]
}

impl AppConfig {
    /// Reads `CONFIG_FILE` (default `config.toml`); a missing file means defaults.
    /// `MEASURE_INTERVAL_MINUTES` and `TZ` override the file.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let mut config = match std::fs::read_to_string(&path) {
            Ok(s) => toml::from_str(&s)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path, "no config file; using defaults");
                Self::default()
            }
            Err(e) => return Err(anyhow::anyhow!("read {}: {}", path, e)),
        };
        config.apply_env(
            std::env::var("MEASURE_INTERVAL_MINUTES").ok().as_deref(),
            std::env::var("TZ").ok().as_deref(),
        );
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Environment overrides. The interval goes through the same coercion as
    /// runtime reconfiguration, so a bad value yields the default instead of an error.
    pub fn apply_env(&mut self, interval: Option<&str>, timezone: Option<&str>) {
        if let Some(raw) = interval {
            self.monitoring.interval_minutes = parse_interval(raw);
        }
        if let Some(tz) = timezone.map(str::trim).filter(|tz| !tz.is_empty()) {
            self.monitoring.timezone = tz.to_string();
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(!self.store.path.is_empty(), "store.path must be non-empty");
        anyhow::ensure!(
            self.monitoring.interval_minutes > 0,
            "monitoring.interval_minutes must be > 0, got {}",
            self.monitoring.interval_minutes
        );
        self.monitoring.tz()?;
        anyhow::ensure!(
            self.monitoring.targets.iter().all(|t| !t.trim().is_empty()),
            "monitoring.targets must not contain empty entries"
        );
        Ok(())
    }
}
