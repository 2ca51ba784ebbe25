//! Orchestrator for a complete folding run.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::collector::{rank, structure_key, CandidateRow, CollectedRun, ResultCollector};
use crate::config::{create_json_config, InferenceConfig, CONFIG_DIR};
use crate::convert::{convert_cached, PdbtbxConverter, StructureConverter};
use crate::error::{FoldError, Result};
use crate::events::{EventSender, PipelineEvent};
use crate::fetch::{DependencyProvisioner, FetchReport};
use crate::inference::{InferenceBackend, InferenceRequest};
use crate::run_id::RunId;
use crate::selector::{select_best, BestModel};
use crate::sequence::{self, normalize_fasta, EXAMPLE_FASTA, FASTA_DIR};
use crate::store::ArtifactStore;

/// FASTA used when the caller names none.
pub const DEFAULT_FASTA_FILE: &str = "default_input.fasta";
/// Inference config used when the caller names none.
pub const DEFAULT_CONFIG_FILE: &str = "quick_inference.json";

/// Result of [`FoldingPipeline::compute`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldOutcome {
    pub run_id: RunId,
    /// Non-clashing candidates, best first.
    pub ranked: Vec<CandidateRow>,
    pub clashing: Vec<usize>,
    pub best: Option<BestModel>,
    /// Converted structure of the best model; `None` when nothing was usable.
    pub structure_path: Option<PathBuf>,
}

/// Result of re-scoring an existing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Selection {
    pub run_id: RunId,
    pub ranked: Vec<CandidateRow>,
    pub clashing: Vec<usize>,
    pub best: Option<BestModel>,
}

pub struct FoldingPipeline {
    inputs: Arc<dyn ArtifactStore>,
    results: Arc<dyn ArtifactStore>,
    dependencies: Arc<dyn DependencyProvisioner>,
    backend: Arc<dyn InferenceBackend>,
    converter: Arc<dyn StructureConverter>,
    collector: ResultCollector,
    force_redownload: bool,
    events: Option<EventSender>,
}

impl FoldingPipeline {
    pub fn new(
        inputs: Arc<dyn ArtifactStore>,
        results: Arc<dyn ArtifactStore>,
        dependencies: Arc<dyn DependencyProvisioner>,
        backend: Arc<dyn InferenceBackend>,
    ) -> Self {
        Self {
            inputs,
            collector: ResultCollector::new(results.clone()),
            results,
            dependencies,
            backend,
            converter: Arc::new(PdbtbxConverter),
            force_redownload: false,
            events: None,
        }
    }

    pub fn with_converter(mut self, converter: Arc<dyn StructureConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_force_redownload(mut self, force: bool) -> Self {
        self.force_redownload = force;
        self
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_scores_to_print(mut self, fields: Vec<String>) -> Self {
        self.collector = ResultCollector::new(self.results.clone()).with_scores_to_print(fields);
        self
    }

    pub fn inputs(&self) -> &Arc<dyn ArtifactStore> {
        &self.inputs
    }

    pub fn results(&self) -> &Arc<dyn ArtifactStore> {
        &self.results
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(ref tx) = self.events {
            // No subscribers is fine.
            let _ = tx.send(event);
        }
    }

    pub async fn ensure_dependencies(&self, force: bool) -> Result<FetchReport> {
        info!("🧬 checking inference dependencies");
        let report = self.dependencies.ensure(force).await?;
        self.emit(PipelineEvent::DependenciesReady {
            downloaded: report.downloaded.len(),
            skipped: report.skipped.len(),
        });
        Ok(report)
    }

    pub async fn create_fasta_file(&self, sequence: &str, name: Option<&str>) -> Result<String> {
        sequence::create_fasta_file(self.inputs.as_ref(), sequence, name).await
    }

    pub async fn create_json_config(&self, config: &InferenceConfig) -> Result<String> {
        create_json_config(self.inputs.as_ref(), config).await
    }

    /// Run a full fold: dependencies, inference, collection, selection and
    /// conversion of the winning structure.
    ///
    /// Empty or missing file names select the defaults; a named file that
    /// does not exist fails before anything is sent to the remote side.
    pub async fn compute(&self, fasta_file: Option<&str>, config_file: Option<&str>) -> Result<FoldOutcome> {
        let (fasta_label, fasta_content, inference_config) = match self.prepare(fasta_file, config_file).await {
            Ok(inputs) => inputs,
            Err(e) => return Err(self.fail(None, e)),
        };

        let run_id = RunId::generate();
        info!(run_id = %run_id, fasta = %fasta_label, "🧬 running inference");
        self.emit(PipelineEvent::RunStarted {
            run_id: run_id.to_string(),
            fasta_file: fasta_label,
        });

        self.run(run_id.clone(), fasta_content, inference_config)
            .await
            .map_err(|e| self.fail(Some(&run_id), e))
    }

    fn fail(&self, run_id: Option<&RunId>, error: FoldError) -> FoldError {
        warn!(run_id = ?run_id.map(RunId::to_string), error = %error, "Folding run failed");
        self.emit(PipelineEvent::RunFailed {
            run_id: run_id.map(RunId::to_string),
            error: error.to_string(),
        });
        error
    }

    /// Dependencies and inputs, everything needed before a run id exists.
    async fn prepare(
        &self,
        fasta_file: Option<&str>,
        config_file: Option<&str>,
    ) -> Result<(String, String, InferenceConfig)> {
        self.ensure_dependencies(self.force_redownload).await?;
        let (fasta_label, fasta_content) = self.resolve_fasta(fasta_file).await?;
        let inference_config = self.resolve_config(config_file).await?;
        Ok((fasta_label, fasta_content, inference_config))
    }

    async fn run(&self, run_id: RunId, fasta_content: String, inference_config: InferenceConfig) -> Result<FoldOutcome> {
        let request = InferenceRequest {
            fasta_content,
            inference_config,
            run_id: run_id.clone(),
        };
        let results = self.backend.fold(&request).await?;

        let collected = self.collector.collect(&run_id, &results).await?;
        self.emit_scores(&collected);

        let best = select_best(&collected.rows);
        self.emit(PipelineEvent::BestModelSelected {
            run_id: run_id.to_string(),
            model_idx: best.map(|b| b.model_idx),
            aggregate_score: best.map(|b| b.aggregate_score),
        });

        let structure_path = match best {
            Some(b) => Some(self.convert_best(&run_id, b.model_idx).await?),
            None => None,
        };

        self.emit(PipelineEvent::RunCompleted {
            run_id: run_id.to_string(),
            structure_file: structure_path
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned()),
        });

        Ok(FoldOutcome {
            run_id,
            ranked: rank(collected.rows),
            clashing: collected.clashing,
            best,
            structure_path,
        })
    }

    /// Re-read the scores of an earlier run and select its best model.
    pub async fn select_best_model(&self, run_id: &str, number_of_scores: usize) -> Result<Selection> {
        let run_id = RunId::parse(run_id)?;
        let collected = self.collector.load_run(&run_id, number_of_scores).await?;
        let best = select_best(&collected.rows);
        Ok(Selection {
            run_id,
            ranked: rank(collected.rows),
            clashing: collected.clashing,
            best,
        })
    }

    async fn resolve_fasta(&self, fasta_file: Option<&str>) -> Result<(String, String)> {
        let (name, required) = match fasta_file.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => (name, true),
            None => (DEFAULT_FASTA_FILE, false),
        };
        let key = format!("{FASTA_DIR}/{name}");

        if !self.inputs.exists(&key).await? {
            if required {
                return Err(FoldError::InputNotFound(key));
            }
            info!("No default FASTA on disk, using the built-in example");
            return Ok(("<example>".to_string(), EXAMPLE_FASTA.to_string()));
        }

        let bytes = self.inputs.read(&key).await?;
        let raw = String::from_utf8(bytes)
            .map_err(|_| FoldError::InvalidInput(format!("{key} is not valid UTF-8")))?;
        Ok((name.to_string(), normalize_fasta(&raw, None)?))
    }

    async fn resolve_config(&self, config_file: Option<&str>) -> Result<InferenceConfig> {
        match config_file.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => {
                info!(config = %name, "🧬 loading inference config");
                InferenceConfig::load(self.inputs.as_ref(), name).await
            }
            None => {
                let key = format!("{CONFIG_DIR}/{DEFAULT_CONFIG_FILE}");
                if self.inputs.exists(&key).await? {
                    InferenceConfig::load(self.inputs.as_ref(), DEFAULT_CONFIG_FILE).await
                } else {
                    Ok(InferenceConfig::default())
                }
            }
        }
    }

    fn emit_scores(&self, collected: &CollectedRun) {
        for row in &collected.rows {
            self.emit(PipelineEvent::CandidateScored {
                run_id: collected.run_id.to_string(),
                model_idx: row.model_idx,
                aggregate_score: row.aggregate_score,
            });
        }
        for &model_idx in &collected.clashing {
            self.emit(PipelineEvent::CandidateExcluded {
                run_id: collected.run_id.to_string(),
                model_idx,
            });
        }
    }

    async fn convert_best(&self, run_id: &RunId, model_idx: usize) -> Result<PathBuf> {
        let source = self.results.locate(&structure_key(run_id, model_idx))?;
        let converter = self.converter.clone();
        tokio::task::spawn_blocking(move || convert_cached(converter.as_ref(), &source))
            .await
            .map_err(|e| FoldError::Conversion(format!("conversion task failed: {e}")))?
    }
}
