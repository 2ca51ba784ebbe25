//! Inference configuration passed to the remote model.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{FoldError, Result};
use crate::run_id::short_token;
use crate::store::ArtifactStore;

/// Subfolder of the inputs store holding JSON configs.
pub const CONFIG_DIR: &str = "config";

pub const MAX_DIFFN_TIMESTEPS: u32 = 500;
pub const MAX_TRUNK_RECYCLES: u32 = 5;

/// Option label enabling ESM embeddings.
pub const OPTION_ESM_EMBEDDINGS: &str = "ESM_embeddings";
/// Option label enabling the MSA server.
pub const OPTION_MSA_SERVER: &str = "MSA_server";

/// Knobs forwarded to the remote Chai-1 run. Always valid once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawInferenceConfig")]
pub struct InferenceConfig {
    pub num_trunk_recycles: u32,
    pub num_diffn_timesteps: u32,
    pub seed: u64,
    pub use_esm_embeddings: bool,
    pub use_msa_server: bool,
}

#[derive(Deserialize)]
struct RawInferenceConfig {
    #[serde(default = "default_trunk_recycles")]
    num_trunk_recycles: u32,
    #[serde(default = "default_diffn_timesteps")]
    num_diffn_timesteps: u32,
    #[serde(default = "default_seed")]
    seed: u64,
    #[serde(default = "bool_true")]
    use_esm_embeddings: bool,
    #[serde(default)]
    use_msa_server: bool,
}

fn default_trunk_recycles()  -> u32  { 3 }
fn default_diffn_timesteps() -> u32  { 200 }
fn default_seed()            -> u64  { 42 }
fn bool_true()               -> bool { true }

impl TryFrom<RawInferenceConfig> for InferenceConfig {
    type Error = FoldError;

    fn try_from(raw: RawInferenceConfig) -> Result<Self> {
        Self::new(
            raw.num_trunk_recycles,
            raw.num_diffn_timesteps,
            raw.seed,
            raw.use_esm_embeddings,
            raw.use_msa_server,
        )
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            num_trunk_recycles: default_trunk_recycles(),
            num_diffn_timesteps: default_diffn_timesteps(),
            seed: default_seed(),
            use_esm_embeddings: true,
            use_msa_server: false,
        }
    }
}

impl InferenceConfig {
    pub fn new(
        num_trunk_recycles: u32,
        num_diffn_timesteps: u32,
        seed: u64,
        use_esm_embeddings: bool,
        use_msa_server: bool,
    ) -> Result<Self> {
        if !(1..=MAX_TRUNK_RECYCLES).contains(&num_trunk_recycles) {
            return Err(FoldError::InvalidConfig(format!(
                "num_trunk_recycles must be in 1..={MAX_TRUNK_RECYCLES}, got {num_trunk_recycles}"
            )));
        }
        if !(1..=MAX_DIFFN_TIMESTEPS).contains(&num_diffn_timesteps) {
            return Err(FoldError::InvalidConfig(format!(
                "num_diffn_timesteps must be in 1..={MAX_DIFFN_TIMESTEPS}, got {num_diffn_timesteps}"
            )));
        }
        Ok(Self {
            num_trunk_recycles,
            num_diffn_timesteps,
            seed,
            use_esm_embeddings,
            use_msa_server,
        })
    }

    /// Build from a checkbox-style option list (`ESM_embeddings`, `MSA_server`).
    pub fn from_options<S: AsRef<str>>(
        num_diffn_timesteps: u32,
        num_trunk_recycles: u32,
        seed: u64,
        options: &[S],
    ) -> Result<Self> {
        let has = |label: &str| options.iter().any(|o| o.as_ref() == label);
        Self::new(
            num_trunk_recycles,
            num_diffn_timesteps,
            seed,
            has(OPTION_ESM_EMBEDDINGS),
            has(OPTION_MSA_SERVER),
        )
    }

    /// Load `config/{file_name}` from the inputs store.
    pub async fn load(store: &dyn ArtifactStore, file_name: &str) -> Result<Self> {
        let key = format!("{CONFIG_DIR}/{file_name}");
        if !store.exists(&key).await? {
            return Err(FoldError::InputNotFound(key));
        }
        let bytes = store.read(&key).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Persist `config` as `config/chai1_{token}_config.json` and return the file name.
pub async fn create_json_config(store: &dyn ArtifactStore, config: &InferenceConfig) -> Result<String> {
    let file_name = format!("chai1_{}_config.json", short_token());
    let body = serde_json::to_vec_pretty(config)?;
    store.write(&format!("{CONFIG_DIR}/{file_name}"), &body).await?;
    info!(file = %file_name, ?config, "Created inference config");
    Ok(file_name)
}
