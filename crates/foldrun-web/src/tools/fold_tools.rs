//! Tools that drive the folding pipeline itself.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use foldrun_core::pipeline::FoldingPipeline;
use serde_json::Value;

use super::{opt_str, opt_u64, required_str, FoldTool};

pub struct FetchDependenciesTool {
    pipeline: Arc<FoldingPipeline>,
}

impl FetchDependenciesTool {
    pub fn new(pipeline: Arc<FoldingPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl FoldTool for FetchDependenciesTool {
    fn name(&self) -> &str {
        "fetch_dependencies"
    }

    fn description(&self) -> &str {
        "Download the Chai-1 model weights and conformer library into the models \
         volume. Assets already present are skipped unless `force` is set."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "force": {
                    "type": "boolean",
                    "description": "Re-download every asset",
                    "default": false
                }
            }
        })
    }

    fn requires_approval(&self) -> bool {
        true
    }

    async fn invoke(&self, params: Value) -> Result<Value> {
        let force = params["force"].as_bool().unwrap_or(false);
        let report = self.pipeline.ensure_dependencies(force).await?;
        Ok(serde_json::json!({
            "status": "success",
            "downloaded": report.downloaded,
            "skipped": report.skipped,
        }))
    }
}

pub struct ComputeFoldTool {
    pipeline: Arc<FoldingPipeline>,
}

impl ComputeFoldTool {
    pub fn new(pipeline: Arc<FoldingPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl FoldTool for ComputeFoldTool {
    fn name(&self) -> &str {
        "compute_fold"
    }

    fn description(&self) -> &str {
        "Fold a FASTA input on the remote Chai-1 backend, score the five candidates, \
         drop those with inter-chain clashes and convert the best one to PDB. \
         Without file names the default input and config are used."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "fasta_file": {
                    "type": "string",
                    "description": "File name under fasta/, as returned by create_fasta_file"
                },
                "config_file": {
                    "type": "string",
                    "description": "File name under config/, as returned by create_json_config"
                }
            }
        })
    }

    fn requires_approval(&self) -> bool {
        true
    }

    async fn invoke(&self, params: Value) -> Result<Value> {
        let fasta_file = opt_str(&params, "fasta_file");
        let config_file = opt_str(&params, "config_file");

        tracing::info!(tool = "compute_fold", ?fasta_file, ?config_file, "Starting fold");
        let outcome = self.pipeline.compute(fasta_file, config_file).await?;

        let structure_file = outcome
            .structure_path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned());
        let message = match outcome.best {
            Some(best) => format!(
                "model {} selected with aggregate score {:.4}",
                best.model_idx, best.aggregate_score
            ),
            None => "no usable model: every candidate has inter-chain clashes".to_string(),
        };

        Ok(serde_json::json!({
            "status": "success",
            "message": message,
            "run_id": outcome.run_id,
            "ranked": outcome.ranked,
            "clashing": outcome.clashing,
            "best": outcome.best,
            "structure_file": structure_file,
        }))
    }
}

pub struct SelectBestModelTool {
    pipeline: Arc<FoldingPipeline>,
    number_of_scores: usize,
}

impl SelectBestModelTool {
    pub fn new(pipeline: Arc<FoldingPipeline>, number_of_scores: usize) -> Self {
        Self { pipeline, number_of_scores }
    }
}

#[async_trait]
impl FoldTool for SelectBestModelTool {
    fn name(&self) -> &str {
        "select_best_model"
    }

    fn description(&self) -> &str {
        "Re-read the score files of an earlier run and report its ranking and best \
         non-clashing model."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "run_id": {
                    "type": "string",
                    "description": "Eight-character run id"
                },
                "number_of_scores": {
                    "type": "integer",
                    "minimum": 1,
                    "default": self.number_of_scores
                }
            },
            "required": ["run_id"]
        })
    }

    async fn invoke(&self, params: Value) -> Result<Value> {
        let run_id = required_str(&params, "run_id")?;
        let number_of_scores = opt_u64(&params, "number_of_scores")?
            .map(|n| n as usize)
            .unwrap_or(self.number_of_scores);

        let selection = self.pipeline.select_best_model(run_id, number_of_scores).await?;
        Ok(serde_json::json!({
            "status": "success",
            "run_id": selection.run_id,
            "ranked": selection.ranked,
            "clashing": selection.clashing,
            "best": selection.best,
        }))
    }
}
