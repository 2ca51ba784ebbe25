//! Model weight fetching for the shared models store.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};

use crate::error::{FoldError, Result};
use crate::store::ArtifactStore;

/// Published asset host (the path spelling is the upstream one).
pub const DEFAULT_ASSET_BASE_URL: &str = "https://chaiassets.com/chai1-inference-depencencies/";

/// Files the Chai-1 runtime expects under its downloads directory.
pub const INFERENCE_DEPENDENCIES: [&str; 6] = [
    "conformers_v1.apkl",
    "models_v2/trunk.pt",
    "models_v2/token_embedder.pt",
    "models_v2/feature_embedding.pt",
    "models_v2/diffusion_module.pt",
    "models_v2/confidence_head.pt",
];

/// Write buffer size for streamed downloads.
pub const CHUNK_SIZE: usize = 8192;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";

const PARTIAL_SUFFIX: &str = ".part";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchReport {
    pub downloaded: Vec<String>,
    pub skipped: Vec<String>,
}

/// Something that can make the inference dependencies available.
#[async_trait]
pub trait DependencyProvisioner: Send + Sync {
    async fn ensure(&self, force: bool) -> Result<FetchReport>;
}

/// Downloads missing assets concurrently into the models store.
pub struct DependencyFetcher {
    client: Client,
    base_url: String,
    assets: Vec<String>,
    store: Arc<dyn ArtifactStore>,
}

impl DependencyFetcher {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Result<Self> {
        let client = Client::builder().user_agent(DEFAULT_USER_AGENT).build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_ASSET_BASE_URL.to_string(),
            assets: INFERENCE_DEPENDENCIES.iter().map(|s| s.to_string()).collect(),
            store,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.base_url = base_url;
        self
    }

    pub fn with_assets<I, S>(mut self, assets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.assets = assets.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    /// Fetch every missing asset (all of them when `force` is set), then commit.
    ///
    /// Downloads run concurrently on the calling task; the first failure
    /// aborts the batch and the store is not committed. The commit happens
    /// even when nothing had to be downloaded.
    pub async fn fetch_all(&self, force: bool) -> Result<FetchReport> {
        let mut report = FetchReport::default();
        let mut tasks = Vec::new();

        for asset in &self.assets {
            if !force && self.store.exists(asset).await? {
                debug!(asset = %asset, "Dependency already present");
                report.skipped.push(asset.clone());
                continue;
            }
            info!(asset = %asset, "🧬 downloading dependency");
            report.downloaded.push(asset.clone());
            tasks.push(self.download(asset));
        }

        let issued = tasks.len();
        try_join_all(tasks).await?;

        self.store.commit().await?;
        info!(downloaded = issued, skipped = report.skipped.len(), "Inference dependencies ready");
        Ok(report)
    }

    async fn download(&self, asset: &str) -> Result<()> {
        let url = format!("{}{}", self.base_url, asset);
        let mut response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FoldError::Download {
                asset: asset.to_string(),
                status: status.as_u16(),
            });
        }

        let partial = format!("{asset}{PARTIAL_SUFFIX}");
        let mut writer = BufWriter::with_capacity(CHUNK_SIZE, self.store.create(&partial).await?);
        let mut written = 0usize;
        while let Some(chunk) = response.chunk().await? {
            writer.write_all(&chunk).await?;
            written += chunk.len();
        }
        writer.flush().await?;
        writer.shutdown().await?;
        drop(writer);

        self.store.rename(&partial, asset).await?;
        debug!(asset = %asset, bytes = written, "Dependency downloaded");
        Ok(())
    }
}

#[async_trait]
impl DependencyProvisioner for DependencyFetcher {
    async fn ensure(&self, force: bool) -> Result<FetchReport> {
        self.fetch_all(force).await
    }
}
