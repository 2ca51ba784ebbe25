//! Boundary to the remote GPU inference function.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::InferenceConfig;
use crate::error::{FoldError, Result};
use crate::run_id::RunId;

/// Number of diffusion samples Chai-1 produces per run.
pub const N_DIFFUSION_SAMPLES: usize = 5;

/// Hard wall-clock limit applied to one remote run.
pub const DEFAULT_INFERENCE_TIMEOUT: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Serialize)]
pub struct InferenceRequest {
    pub fasta_content: String,
    pub inference_config: InferenceConfig,
    pub run_id: RunId,
}

/// One candidate as returned by the remote side.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCandidate {
    /// Raw `.npz` score archive.
    pub scores: Vec<u8>,
    /// mmCIF text of the predicted structure.
    pub structure: String,
}

/// A remote executor that folds a sequence and returns its candidate batch
/// in model index order.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn fold(&self, request: &InferenceRequest) -> Result<Vec<RawCandidate>>;
}

#[derive(Deserialize)]
struct WireResponse {
    results: Vec<WireCandidate>,
}

#[derive(Deserialize)]
struct WireCandidate {
    scores: String,
    cif: String,
}

/// HTTP client for a deployed inference endpoint.
pub struct RemoteInference {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
    expected_samples: usize,
}

impl RemoteInference {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key: None,
            timeout: DEFAULT_INFERENCE_TIMEOUT,
            expected_samples: N_DIFFUSION_SAMPLES,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_expected_samples(mut self, expected_samples: usize) -> Self {
        self.expected_samples = expected_samples;
        self
    }

    async fn call(&self, request: &InferenceRequest) -> Result<Vec<RawCandidate>> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FoldError::Inference(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let wire: WireResponse = response.json().await?;
        wire.results
            .into_iter()
            .enumerate()
            .map(|(idx, c)| {
                let scores = STANDARD.decode(c.scores.as_bytes()).map_err(|e| {
                    FoldError::Inference(format!("candidate {idx} has invalid base64 scores: {e}"))
                })?;
                Ok(RawCandidate { scores, structure: c.cif })
            })
            .collect()
    }
}

#[async_trait]
impl InferenceBackend for RemoteInference {
    async fn fold(&self, request: &InferenceRequest) -> Result<Vec<RawCandidate>> {
        info!(run_id = %request.run_id, endpoint = %self.endpoint, "🧬 running inference");

        let results = match tokio::time::timeout(self.timeout, self.call(request)).await {
            Ok(results) => results?,
            Err(_) => {
                warn!(run_id = %request.run_id, timeout = ?self.timeout, "Remote inference timed out");
                return Err(FoldError::Timeout(self.timeout));
            }
        };

        if results.len() != self.expected_samples {
            return Err(FoldError::Inference(format!(
                "expected {} candidates, got {}",
                self.expected_samples,
                results.len()
            )));
        }

        info!(run_id = %request.run_id, candidates = results.len(), "🧬 done");
        Ok(results)
    }
}
