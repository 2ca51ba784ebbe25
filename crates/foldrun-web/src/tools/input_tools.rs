//! Tools that prepare run inputs: FASTA files and inference configs.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use foldrun_core::config::{InferenceConfig, OPTION_ESM_EMBEDDINGS, OPTION_MSA_SERVER};
use foldrun_core::pipeline::FoldingPipeline;
use foldrun_core::FoldError;
use serde_json::Value;

use super::{opt_str, opt_u64, FoldTool};

pub struct CreateFastaFileTool {
    pipeline: Arc<FoldingPipeline>,
}

impl CreateFastaFileTool {
    pub fn new(pipeline: Arc<FoldingPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl FoldTool for CreateFastaFileTool {
    fn name(&self) -> &str {
        "create_fasta_file"
    }

    fn description(&self) -> &str {
        "Store a protein sequence as a FASTA file in the inputs volume. A header is \
         added when the text has none; an empty sequence stores the example protein. \
         Returns the file name to pass to compute_fold."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "sequence": {
                    "type": "string",
                    "description": "Raw sequence or FASTA text"
                },
                "name": {
                    "type": "string",
                    "description": "Record name used when a header has to be added",
                    "default": "PROTEIN"
                }
            },
            "required": ["sequence"]
        })
    }

    async fn invoke(&self, params: Value) -> Result<Value> {
        let sequence = params["sequence"].as_str().unwrap_or_default();
        let name = opt_str(&params, "name");

        tracing::info!(tool = "create_fasta_file", residues = sequence.len(), "Creating FASTA file");
        let file_name = self.pipeline.create_fasta_file(sequence, name).await?;

        Ok(serde_json::json!({
            "status": "success",
            "fasta_file": file_name,
        }))
    }
}

pub struct CreateJsonConfigTool {
    pipeline: Arc<FoldingPipeline>,
}

impl CreateJsonConfigTool {
    pub fn new(pipeline: Arc<FoldingPipeline>) -> Self {
        Self { pipeline }
    }
}

fn parse_options(params: &Value) -> Result<Vec<String>> {
    match &params["options"] {
        Value::Null => Ok(vec![OPTION_ESM_EMBEDDINGS.to_string()]),
        Value::Array(items) => items
            .iter()
            .map(|v| -> Result<String> {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| FoldError::InvalidInput("`options` must contain strings".to_string()).into())
            })
            .collect(),
        _ => Err(FoldError::InvalidInput("`options` must be an array".to_string()).into()),
    }
}

fn to_u32(value: Option<u64>, key: &str, default: u32) -> Result<u32> {
    match value {
        None => Ok(default),
        Some(v) => u32::try_from(v)
            .map_err(|_| FoldError::InvalidConfig(format!("`{key}` is out of range: {v}")).into()),
    }
}

#[async_trait]
impl FoldTool for CreateJsonConfigTool {
    fn name(&self) -> &str {
        "create_json_config"
    }

    fn description(&self) -> &str {
        "Validate Chai-1 inference settings and store them as a JSON config file. \
         Returns the file name to pass to compute_fold."
    }

    fn parameters_schema(&self) -> Value {
        let defaults = InferenceConfig::default();
        serde_json::json!({
            "type": "object",
            "properties": {
                "num_diffn_timesteps": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": foldrun_core::config::MAX_DIFFN_TIMESTEPS,
                    "default": defaults.num_diffn_timesteps
                },
                "num_trunk_recycles": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": foldrun_core::config::MAX_TRUNK_RECYCLES,
                    "default": defaults.num_trunk_recycles
                },
                "seed": {
                    "type": "integer",
                    "default": defaults.seed
                },
                "options": {
                    "type": "array",
                    "items": { "type": "string", "enum": [OPTION_ESM_EMBEDDINGS, OPTION_MSA_SERVER] },
                    "default": [OPTION_ESM_EMBEDDINGS]
                }
            }
        })
    }

    async fn invoke(&self, params: Value) -> Result<Value> {
        let defaults = InferenceConfig::default();
        let timesteps = to_u32(
            opt_u64(&params, "num_diffn_timesteps")?,
            "num_diffn_timesteps",
            defaults.num_diffn_timesteps,
        )?;
        let recycles = to_u32(
            opt_u64(&params, "num_trunk_recycles")?,
            "num_trunk_recycles",
            defaults.num_trunk_recycles,
        )?;
        let seed = opt_u64(&params, "seed")?.unwrap_or(defaults.seed);
        let options = parse_options(&params)?;

        let config = InferenceConfig::from_options(timesteps, recycles, seed, &options)?;
        let file_name = self.pipeline.create_json_config(&config).await?;

        Ok(serde_json::json!({
            "status": "success",
            "config_file": file_name,
            "config": config,
        }))
    }
}
