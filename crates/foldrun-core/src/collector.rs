//! Persistence, scoring and ranking of a run's candidates.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{FoldError, Result};
use crate::inference::RawCandidate;
use crate::run_id::RunId;
use crate::scores::{ScoreBundle, AGGREGATE_SCORE, IPTM, PTM};
use crate::store::ArtifactStore;

/// Subfolder of the results store holding score archives.
pub const SCORE_DIR: &str = "score";
/// Subfolder of the results store holding predicted structures.
pub const MOLECULES_DIR: &str = "molecules";

pub fn score_file_name(run_id: &RunId, model_idx: usize) -> String {
    format!("{run_id}-scores.model_idx_{model_idx}.npz")
}

pub fn structure_file_name(run_id: &RunId, model_idx: usize) -> String {
    format!("{run_id}-preds.model_idx_{model_idx}.cif")
}

pub fn score_key(run_id: &RunId, model_idx: usize) -> String {
    format!("{SCORE_DIR}/{}", score_file_name(run_id, model_idx))
}

pub fn structure_key(run_id: &RunId, model_idx: usize) -> String {
    format!("{MOLECULES_DIR}/{}", structure_file_name(run_id, model_idx))
}

/// One non-clashing candidate of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRow {
    pub model_idx: usize,
    pub aggregate_score: f64,
    pub ptm: f64,
    pub iptm: f64,
    pub structure_file: String,
}

/// Everything the collector learned about a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectedRun {
    pub run_id: RunId,
    /// Non-clashing candidates in index order.
    pub rows: Vec<CandidateRow>,
    /// Indices excluded for inter-chain clashes.
    pub clashing: Vec<usize>,
}

/// Writes candidates to the results store and builds the result table.
pub struct ResultCollector {
    store: Arc<dyn ArtifactStore>,
    scores_to_print: Vec<String>,
}

impl ResultCollector {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            store,
            scores_to_print: vec![AGGREGATE_SCORE.to_string(), PTM.to_string(), IPTM.to_string()],
        }
    }

    /// Fields logged for every usable candidate.
    pub fn with_scores_to_print(mut self, fields: Vec<String>) -> Self {
        self.scores_to_print = fields;
        self
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Persist each candidate, read its scores back from disk and keep the
    /// non-clashing ones.
    pub async fn collect(&self, run_id: &RunId, results: &[RawCandidate]) -> Result<CollectedRun> {
        info!(run_id = %run_id, candidates = results.len(), "🧬 saving results");
        let mut collected = CollectedRun {
            run_id: run_id.clone(),
            rows: Vec::new(),
            clashing: Vec::new(),
        };

        for (idx, candidate) in results.iter().enumerate() {
            let key = score_key(run_id, idx);
            self.store.write(&key, &candidate.scores).await?;
            self.store
                .write(&structure_key(run_id, idx), candidate.structure.as_bytes())
                .await?;

            let persisted = self.store.read(&key).await?;
            if persisted != candidate.scores {
                return Err(FoldError::Store(format!("{key} differs from the received scores")));
            }
            let bundle = ScoreBundle::from_npz(&persisted)?;
            self.record(&mut collected, idx, &bundle);
        }

        self.store.commit().await?;
        Ok(collected)
    }

    /// Rebuild the table of an earlier run from its score files.
    pub async fn load_run(&self, run_id: &RunId, number_of_scores: usize) -> Result<CollectedRun> {
        info!(run_id = %run_id, "🧬 Start reading scores for each inference...");
        let mut collected = CollectedRun {
            run_id: run_id.clone(),
            rows: Vec::new(),
            clashing: Vec::new(),
        };

        for idx in 0..number_of_scores {
            let key = score_key(run_id, idx);
            if !self.store.exists(&key).await? {
                return Err(FoldError::InputNotFound(key));
            }
            let bundle = ScoreBundle::from_npz(&self.store.read(&key).await?)?;
            self.record(&mut collected, idx, &bundle);
        }
        Ok(collected)
    }

    fn record(&self, collected: &mut CollectedRun, idx: usize, bundle: &ScoreBundle) {
        if bundle.has_inter_chain_clashes {
            info!(model_idx = idx, "🧬 Model has inter-chain clashes, skipping scores.");
            collected.clashing.push(idx);
            return;
        }

        for field in &self.scores_to_print {
            match bundle.field(field) {
                Some(value) => info!(model_idx = idx, field = %field, value, "score"),
                None => debug!(model_idx = idx, field = %field, "score field not present"),
            }
        }

        collected.rows.push(CandidateRow {
            model_idx: idx,
            aggregate_score: bundle.aggregate_score,
            ptm: bundle.ptm,
            iptm: bundle.iptm,
            structure_file: structure_file_name(&collected.run_id, idx),
        });
    }
}

/// Sort rows by aggregate score, best first. Ties keep their input order and
/// non-finite scores go last, matching what the selector ignores.
pub fn rank(mut rows: Vec<CandidateRow>) -> Vec<CandidateRow> {
    rows.sort_by(|a, b| {
        let (a, b) = (a.aggregate_score, b.aggregate_score);
        match (a.is_finite(), b.is_finite()) {
            (true, true) => b.total_cmp(&a),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => Ordering::Equal,
        }
    });
    rows
}
