use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::types::Market;

/// Environment configuration: secrets and deployment-specific paths.
/// Tunables live in the TOML [`FileConfig`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub config_path: Option<PathBuf>,

    // Distance source
    pub google_maps_api_key: Option<String>,

    // Session engines
    pub chrome_bin: String,
    pub browserless_url: Option<String>,
    pub browserless_token: Option<String>,
}

impl AppConfig {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let config = Self {
            data_dir: PathBuf::from(
                env::var("LANDSCOUT_DATA_DIR").unwrap_or_else(|_| "database".to_string()),
            ),
            config_path: optional_env("LANDSCOUT_CONFIG").map(PathBuf::from),
            google_maps_api_key: optional_env("GOOGLE_MAPS_API_KEY"),
            chrome_bin: env::var("CHROME_BIN").unwrap_or_else(|_| "chromium".to_string()),
            browserless_url: optional_env("BROWSERLESS_URL"),
            browserless_token: optional_env("BROWSERLESS_TOKEN"),
        };

        config.log_keys();
        config
    }

    fn log_keys(&self) {
        fn preview(val: &Option<String>) -> String {
            match val {
                Some(v) if !v.is_empty() => {
                    let n = v.len().min(5);
                    format!("{}...({} chars)", &v[..n], v.len())
                }
                _ => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  LANDSCOUT_DATA_DIR: {}", self.data_dir.display());
        tracing::info!("  GOOGLE_MAPS_API_KEY: {}", preview(&self.google_maps_api_key));
        tracing::info!("  BROWSERLESS_URL: {}", preview(&self.browserless_url));
        tracing::info!("  BROWSERLESS_TOKEN: {}", preview(&self.browserless_token));
        tracing::info!("  CHROME_BIN: {}", self.chrome_bin);
    }

    pub fn master_path(&self) -> PathBuf {
        self.data_dir.join("master.csv")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("log")
    }

    pub fn census_cache_dir(&self) -> PathBuf {
        self.data_dir.join("census")
    }

    /// TOML tunables from `LANDSCOUT_CONFIG`, or defaults when unset.
    pub fn file_config(&self) -> Result<FileConfig> {
        match &self.config_path {
            Some(path) => load_config(path),
            None => Ok(FileConfig::default()),
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// TOML-backed tunables. Every section is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub markets: Vec<Market>,
    pub census: CensusConfig,
    pub distance: DistanceConfig,
    pub enrichment: EnrichmentConfig,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            markets: vec![
                Market::new("Upstate NY", "NY"),
                Market::new("I85 Corridor", "I85"),
                Market::new("Florida", "FL"),
            ],
            census: CensusConfig::default(),
            distance: DistanceConfig::default(),
            enrichment: EnrichmentConfig::default(),
        }
    }
}

impl FileConfig {
    /// Look up a market by its code, case-insensitively.
    pub fn market(&self, code: &str) -> Option<&Market> {
        self.markets
            .iter()
            .find(|m| m.code.eq_ignore_ascii_case(code))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CensusConfig {
    /// Page hosting the report form.
    pub endpoint: String,
    /// Text of the results-page link pointing at the tabular artifact.
    pub artifact_link_text: String,
    pub cooldown_ms: u64,
    pub render_timeout_secs: u64,
    /// Engine names in priority order: `chrome`, `browserless`.
    pub engines: Vec<String>,
}

impl Default for CensusConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://mcdc.missouri.edu/applications/capsACS.html".to_string(),
            artifact_link_text: "CSV file".to_string(),
            cooldown_ms: 2000,
            render_timeout_secs: 30,
            engines: vec!["chrome".to_string(), "browserless".to_string()],
        }
    }
}

impl CensusConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DistanceConfig {
    pub keyword: String,
    pub place_type: String,
    pub search_radius_m: u32,
    pub cooldown_ms: u64,
    /// Total attempts per API call, including the first.
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
}

impl Default for DistanceConfig {
    fn default() -> Self {
        Self {
            keyword: "walmart".to_string(),
            place_type: "store".to_string(),
            search_radius_m: 50_000,
            cooldown_ms: 1500,
            max_attempts: 4,
            backoff_base_ms: 1000,
        }
    }
}

impl DistanceConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnrichmentConfig {
    /// Retry passes after the initial census pass.
    pub max_retry_passes: u32,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            max_retry_passes: 2,
        }
    }
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: FileConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    Ok(config)
}
