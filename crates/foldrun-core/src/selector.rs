//! Best-model selection.
//!
//! Policy: highest aggregate score wins, compared with strict `>` so the first
//! candidate seen keeps its place on an exact tie. There is no numeric floor:
//! the empty state is `None`, so a genuine score of `0.0` is still selectable.
//! Non-finite scores are never selected.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::collector::CandidateRow;
use crate::scores::ScoreBundle;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestModel {
    pub model_idx: usize,
    pub aggregate_score: f64,
}

fn pick<I>(candidates: I) -> Option<BestModel>
where
    I: IntoIterator<Item = (usize, f64)>,
{
    let mut best: Option<BestModel> = None;
    for (model_idx, aggregate_score) in candidates {
        if !aggregate_score.is_finite() {
            continue;
        }
        let better = match best {
            None => true,
            Some(current) => aggregate_score > current.aggregate_score,
        };
        if better {
            best = Some(BestModel { model_idx, aggregate_score });
        }
    }

    match best {
        Some(b) => info!(
            model_idx = b.model_idx,
            aggregate_score = b.aggregate_score,
            "🧬 Best model selected"
        ),
        None => info!("🧬 No usable model: every candidate was excluded"),
    }
    best
}

/// Select over the collector's table, in the order given.
pub fn select_best(rows: &[CandidateRow]) -> Option<BestModel> {
    pick(rows.iter().map(|r| (r.model_idx, r.aggregate_score)))
}

/// Select directly over per-index score bundles, skipping clash-flagged ones.
pub fn select_best_from_bundles<'a, I>(bundles: I) -> Option<BestModel>
where
    I: IntoIterator<Item = (usize, &'a ScoreBundle)>,
{
    pick(
        bundles
            .into_iter()
            .filter(|(_, b)| !b.has_inter_chain_clashes)
            .map(|(idx, b)| (idx, b.aggregate_score)),
    )
}
