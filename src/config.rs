use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::providers::ProviderOptions;

/// Configuration file structure for stagescope.
///
/// Settings are read from the current directory or the user's config
/// directory; command-line flags take precedence over anything found here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub azure: AzureConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AzureConfig {
    /// Personal access token
    pub token: Option<String>,

    /// Organization URL (e.g., 'https://dev.azure.com/contoso')
    pub organization_url: Option<String>,

    /// Project name or id
    pub project: Option<String>,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Number of pipelines included in a snapshot
    #[serde(default = "default_pipeline_limit")]
    pub pipeline_limit: usize,

    /// Number of runs fetched per pipeline
    #[serde(default = "default_run_limit")]
    pub run_limit: usize,

    /// Recent builds searched when correlating a run
    #[serde(default = "default_fallback_window")]
    pub fallback_window: usize,

    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Summary,
    Json,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            token: None,
            organization_url: None,
            project: None,
            api_version: default_api_version(),
            pipeline_limit: default_pipeline_limit(),
            run_limit: default_run_limit(),
            fallback_window: default_fallback_window(),
            max_concurrent_requests: default_max_concurrent_requests(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl AzureConfig {
    pub fn provider_options(&self) -> ProviderOptions {
        ProviderOptions {
            api_version: self.api_version.clone(),
            max_concurrent_requests: self.max_concurrent_requests,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            fallback_window: self.fallback_window,
        }
    }
}

fn default_api_version() -> String {
    "7.1".to_string()
}

fn default_pipeline_limit() -> usize {
    10
}

fn default_run_limit() -> usize {
    20
}

fn default_fallback_window() -> usize {
    50
}

fn default_max_concurrent_requests() -> usize {
    32
}

fn default_request_timeout_secs() -> u64 {
    30
}

const CANDIDATES: [&str; 4] = [
    "stagescope.toml",
    "stagescope.json",
    "stagescope.yaml",
    "stagescope.yml",
];

impl Config {
    /// Load configuration.
    ///
    /// Searches in this order:
    /// 1. Specified path (must exist)
    /// 2. ./stagescope.{toml,json,yaml,yml}
    /// 3. `<user config dir>/stagescope/config.toml`
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            return Self::load_from_path(path);
        }

        let user_config = dirs::config_dir().map(|dir| dir.join("stagescope").join("config.toml"));

        match discover(Path::new("."), user_config) {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }
}

fn discover(search_dir: &Path, user_config: Option<PathBuf>) -> Option<PathBuf> {
    CANDIDATES
        .iter()
        .map(|candidate| search_dir.join(candidate))
        .chain(user_config)
        .find(|path| path.exists())
}
