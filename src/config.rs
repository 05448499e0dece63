use serde::Deserialize;
use std::path::PathBuf;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Directory holding the persisted preference and view records.
    /// In-memory storage is used when unset.
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,

    /// Per-record byte quota for file-backed storage
    #[serde(default)]
    pub storage_quota_bytes: Option<usize>,

    /// Base URL of the remote catalog API
    #[serde(default)]
    pub catalog_api_url: Option<String>,

    /// Products requested per catalog page
    #[serde(default = "default_catalog_page_size")]
    pub catalog_page_size: usize,

    /// Half-life applied to versioned preference weights on session load
    #[serde(default = "default_decay_half_life_days")]
    pub decay_half_life_days: f64,

    /// Probability that a ranking pass runs in explore mode
    #[serde(default = "default_explore_epsilon")]
    pub explore_epsilon: f64,

    /// Amplitude of the per-product noise added to every score
    #[serde(default = "default_jitter")]
    pub jitter: f64,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_catalog_page_size() -> usize {
    60
}

fn default_decay_half_life_days() -> f64 {
    14.0
}

fn default_explore_epsilon() -> f64 {
    0.08
}

fn default_jitter() -> f64 {
    0.08
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: None,
            storage_quota_bytes: None,
            catalog_api_url: None,
            catalog_page_size: default_catalog_page_size(),
            decay_half_life_days: default_decay_half_life_days(),
            explore_epsilon: default_explore_epsilon(),
            jitter: default_jitter(),
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// Page size clamped to what the catalog API accepts
    pub fn page_size(&self) -> usize {
        self.catalog_page_size.clamp(1, 120)
    }
}
