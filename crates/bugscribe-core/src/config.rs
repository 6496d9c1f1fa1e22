use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow, Context};

use crate::reveal::RevealPacing;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const API_URL_ENV: &str = "BUGSCRIBE_API_URL";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Reveal pacing in whole milliseconds, as written in config.json
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PacingConfig {
    pub base_ms: Option<u64>,
    pub space_ms: Option<u64>,
    pub punctuation_ms: Option<u64>,
    pub jitter_ms: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub api_url: Option<String>,
    pub model: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub captions: Option<Vec<String>>,
    pub pacing: Option<PacingConfig>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// A missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("bugscribe").join("config.json"))
    }

    /// Base URL with precedence: explicit override, environment, file, default
    pub fn resolve_api_url(&self, cli_override: Option<&str>) -> String {
        let env_url = std::env::var(API_URL_ENV).ok();
        Self::pick_api_url(cli_override, env_url.as_deref(), self.api_url.as_deref())
    }

    fn pick_api_url(cli: Option<&str>, env: Option<&str>, file: Option<&str>) -> String {
        [cli, env, file]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|url| !url.is_empty())
            .unwrap_or(DEFAULT_API_URL)
            .to_string()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS).max(1))
    }

    pub fn captions(&self) -> Vec<String> {
        self.captions.clone().unwrap_or_default()
    }

    /// Pacing with unset fields filled from defaults, validated
    pub fn pacing(&self) -> Result<RevealPacing> {
        let defaults = RevealPacing::default();
        let Some(cfg) = &self.pacing else {
            return Ok(defaults);
        };

        let ms = |value: Option<u64>, fallback: Duration| {
            value.map(Duration::from_millis).unwrap_or(fallback)
        };
        let pacing = RevealPacing {
            base: ms(cfg.base_ms, defaults.base),
            space: ms(cfg.space_ms, defaults.space),
            punctuation: ms(cfg.punctuation_ms, defaults.punctuation),
            jitter: ms(cfg.jitter_ms, defaults.jitter),
        };
        pacing.validate().context("Invalid pacing in config")?;
        Ok(pacing)
    }
}
