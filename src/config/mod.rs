use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Complete Breathe configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BreatheConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub sensors: SensorsConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub data: DataConfig,
}

/// Zone cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Upper bound on one fetch-and-compute run (seconds)
    #[serde(default = "default_refresh_timeout")]
    pub refresh_timeout_seconds: u64,
}

fn default_refresh_timeout() -> u64 {
    20
}

impl CacheConfig {
    /// At least one second
    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_seconds.max(1))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            refresh_timeout_seconds: default_refresh_timeout(),
        }
    }
}

/// Multi-node merge configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SensorsConfig {
    /// Minimum endpoints with valid data before a merge is accepted
    #[serde(default = "default_min_reporting")]
    pub min_reporting: usize,
}

fn default_min_reporting() -> usize {
    1
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            min_reporting: default_min_reporting(),
        }
    }
}

/// Periodic refresh configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    /// Pause between zones within one cycle
    #[serde(default = "default_stagger_millis")]
    pub stagger_millis: u64,
}

fn default_interval_minutes() -> u64 {
    15
}

fn default_stagger_millis() -> u64 {
    1000
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }

    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_millis)
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            stagger_millis: default_stagger_millis(),
        }
    }
}

/// Data file locations
#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_breakpoints_path")]
    pub breakpoints_path: String,
    #[serde(default = "default_zones_path")]
    pub zones_path: String,
}

fn default_breakpoints_path() -> String {
    "config/aqi_breakpoints.toml".to_string()
}

fn default_zones_path() -> String {
    "config/zones.toml".to_string()
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            breakpoints_path: default_breakpoints_path(),
            zones_path: default_zones_path(),
        }
    }
}

impl BreatheConfig {
    /// Apply env var overrides. Unparseable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("BREATHE_REFRESH_TIMEOUT_SECONDS") {
            if let Ok(n) = v.parse::<u64>() {
                self.cache.refresh_timeout_seconds = n;
            }
        }
        if let Some(v) = lookup("BREATHE_MIN_REPORTING_SENSORS") {
            if let Ok(n) = v.parse::<usize>() {
                self.sensors.min_reporting = n;
            }
        }
        if let Some(v) = lookup("BREATHE_REFRESH_INTERVAL_MINUTES") {
            if let Ok(n) = v.parse::<u64>() {
                self.refresh.interval_minutes = n;
            }
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: impl AsRef<Path>) -> Result<BreatheConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: BreatheConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Load the file if it exists (defaults otherwise), then apply env overrides
pub fn load_config_or_default(path: impl AsRef<Path>) -> Result<BreatheConfig> {
    let path = path.as_ref();
    let mut config = if path.exists() {
        load_config(path)?
    } else {
        BreatheConfig::default()
    };
    config.apply_env_overrides();
    Ok(config)
}
