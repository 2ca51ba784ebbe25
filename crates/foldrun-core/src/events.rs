//! Progress events emitted while a folding run proceeds.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// Dependency check finished
    DependenciesReady { downloaded: usize, skipped: usize },
    /// Remote inference was submitted
    RunStarted { run_id: String, fasta_file: String },
    /// A candidate's scores were read back
    CandidateScored { run_id: String, model_idx: usize, aggregate_score: f64 },
    /// A candidate was dropped for inter-chain clashes
    CandidateExcluded { run_id: String, model_idx: usize },
    /// Selection finished; `model_idx` is absent when nothing was usable
    BestModelSelected { run_id: String, model_idx: Option<usize>, aggregate_score: Option<f64> },
    /// Run finished
    RunCompleted { run_id: String, structure_file: Option<String> },
    /// Run aborted
    RunFailed { run_id: Option<String>, error: String },
}

impl PipelineEvent {
    /// The `type` tag this event serializes with.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineEvent::DependenciesReady { .. } => "dependencies_ready",
            PipelineEvent::RunStarted { .. } => "run_started",
            PipelineEvent::CandidateScored { .. } => "candidate_scored",
            PipelineEvent::CandidateExcluded { .. } => "candidate_excluded",
            PipelineEvent::BestModelSelected { .. } => "best_model_selected",
            PipelineEvent::RunCompleted { .. } => "run_completed",
            PipelineEvent::RunFailed { .. } => "run_failed",
        }
    }
}

pub type EventSender = broadcast::Sender<PipelineEvent>;

pub fn channel() -> (EventSender, broadcast::Receiver<PipelineEvent>) {
    broadcast::channel(256)
}
