use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::poll::PollSettings;
use crate::report::BatteryEncoding;
use crate::{PRODUCT_ID, VENDOR_ID};

pub const CONFIG_ENV: &str = "DS4_BATTERY_CONFIG";

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub vendor_id: u16,
    pub product_id: u16,
    pub encoding: BatteryEncoding,
    pub initial_delay_secs: f64,
    pub poll_interval_secs: f64,
    pub read_timeout_ms: i32,
    // stop and unload after this long; run until killed when unset
    pub run_for_secs: Option<f64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            vendor_id: VENDOR_ID,
            product_id: PRODUCT_ID,
            encoding: BatteryEncoding::EightLevel,
            initial_delay_secs: 1.0,
            poll_interval_secs: 10.0,
            read_timeout_ms: 100,
            run_for_secs: None,
        }
    }
}

impl Config {
    pub fn poll_settings(&self) -> anyhow::Result<PollSettings> {
        // hidapi blocks indefinitely on a negative timeout
        anyhow::ensure!(
            self.read_timeout_ms >= 0,
            "invalid read_timeout_ms: {}",
            self.read_timeout_ms
        );

        Ok(PollSettings {
            encoding: self.encoding,
            initial_delay: Duration::try_from_secs_f64(self.initial_delay_secs)
                .context("invalid initial_delay_secs")?,
            poll_interval: Duration::try_from_secs_f64(self.poll_interval_secs)
                .context("invalid poll_interval_secs")?,
            read_timeout_ms: self.read_timeout_ms,
        })
    }

    pub fn run_for(&self) -> anyhow::Result<Option<Duration>> {
        self.run_for_secs
            .map(|secs| Duration::try_from_secs_f64(secs).context("invalid run_for_secs"))
            .transpose()
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("failed to parse config")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::from_toml(&text)?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

/// Config path from the first CLI argument, then `DS4_BATTERY_CONFIG`.
pub fn config_path(arg: Option<String>) -> Option<PathBuf> {
    arg.or_else(|| std::env::var(CONFIG_ENV).ok())
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
}

/// Loads the config at `path`, falling back to defaults when none is given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => {
            tracing::debug!("No config file given, using defaults");
            Ok(Config::default())
        }
    }
}
