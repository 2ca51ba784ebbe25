//! Configuration loading for foldrun.
//! Reads foldrun.toml from the current directory or the path in FOLDRUN_CONFIG.
//! Every field has a default, so a missing file means a default configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub dependencies: DependenciesConfig,
    #[serde(default)]
    pub inference: InferenceEndpointConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String { "0.0.0.0:3000".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,
    #[serde(default = "default_inputs_dir")]
    pub inputs_dir: PathBuf,
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
}

fn default_models_dir()  -> PathBuf { PathBuf::from("models/chai1") }
fn default_inputs_dir()  -> PathBuf { PathBuf::from("inputs") }
fn default_results_dir() -> PathBuf { PathBuf::from("results") }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            models_dir: default_models_dir(),
            inputs_dir: default_inputs_dir(),
            results_dir: default_results_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependenciesConfig {
    #[serde(default = "default_asset_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub force_redownload: bool,
}

fn default_asset_base_url() -> String { foldrun_core::fetch::DEFAULT_ASSET_BASE_URL.to_string() }

impl Default for DependenciesConfig {
    fn default() -> Self {
        Self {
            base_url: default_asset_base_url(),
            force_redownload: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceEndpointConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Empty means: read FOLDRUN_INFERENCE_API_KEY.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_samples")]
    pub expected_samples: usize,
}

fn default_endpoint()     -> String { "http://localhost:8000/chai1/infer".to_string() }
fn default_timeout_secs() -> u64    { foldrun_core::inference::DEFAULT_INFERENCE_TIMEOUT.as_secs() }
fn default_samples()      -> usize  { foldrun_core::inference::N_DIFFUSION_SAMPLES }

impl Default for InferenceEndpointConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
            expected_samples: default_samples(),
        }
    }
}

impl InferenceEndpointConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Configured key, falling back to FOLDRUN_INFERENCE_API_KEY.
    pub fn resolve_api_key(&self) -> Option<String> {
        if self.api_key.is_empty() {
            std::env::var("FOLDRUN_INFERENCE_API_KEY").ok().filter(|k| !k.is_empty())
        } else {
            Some(self.api_key.clone())
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_scores_to_print")]
    pub scores_to_print: Vec<String>,
    #[serde(default = "default_samples")]
    pub number_of_scores: usize,
}

fn default_scores_to_print() -> Vec<String> {
    vec!["aggregate_score".to_string(), "ptm".to_string(), "iptm".to_string()]
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            scores_to_print: default_scores_to_print(),
            number_of_scores: default_samples(),
        }
    }
}


impl Config {
    /// Load configuration from `path`, else FOLDRUN_CONFIG, else foldrun.toml.
    /// A missing default file yields the default configuration; a missing
    /// explicitly named file is an error.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match std::env::var("FOLDRUN_CONFIG") {
                Ok(p) => (PathBuf::from(p), true),
                Err(_) => (PathBuf::from("foldrun.toml"), false),
            },
        };

        if !path.exists() {
            if explicit {
                anyhow::bail!(
                    "Config file not found: {}\n\
                     Copy foldrun.example.toml to foldrun.toml and edit it.",
                    path.display()
                );
            }
            tracing::info!("No foldrun.toml found, using defaults");
            return Ok(Self::default());
        }

        Self::from_file(&path)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
