/*
[INPUT]:  Optional YAML configuration file and CLI overrides
[OUTPUT]: Resolved API endpoint, data directory and timeout
[POS]:    Configuration layer - CLI setup
[UPDATE]: When adding new configuration options
*/

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
const DATA_DIR_NAME: &str = "astrogators";

/// On-disk configuration; every field is optional
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CliConfig {
    /// Origin of the Astrogator's Table API
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// Where tokens and local ally codes are kept
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Per-request timeout in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl CliConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content).context("parse config")?;
        Ok(config)
    }

    /// Apply flag overrides and defaults
    pub fn resolve(
        self,
        api_base_url: Option<String>,
        data_dir: Option<PathBuf>,
    ) -> Result<ResolvedConfig> {
        let api_base_url = api_base_url
            .or(self.api_base_url)
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let api_base_url = api_base_url.trim_end_matches('/').to_string();

        let data_dir = match data_dir.or(self.data_dir) {
            Some(dir) => dir,
            None => dirs::data_dir()
                .ok_or_else(|| anyhow!("Could not determine data directory"))?
                .join(DATA_DIR_NAME),
        };

        Ok(ResolvedConfig {
            api_base_url,
            data_dir,
            timeout: self.timeout_secs.map(Duration::from_secs),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub api_base_url: String,
    pub data_dir: PathBuf,
    pub timeout: Option<Duration>,
}
