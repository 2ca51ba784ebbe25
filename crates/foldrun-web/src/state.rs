//! Shared application state for the web server.

use std::sync::Arc;

use foldrun_core::events::{EventSender, PipelineEvent};
use foldrun_core::store::ArtifactStore;
use tokio::sync::broadcast;

use crate::tools::ToolRegistry;

/// Shared state injected into every Axum handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ToolRegistry>,
    /// Results volume, read by the structure viewer
    pub results: Arc<dyn ArtifactStore>,
    /// Broadcast channel for SSE push events
    pub event_tx: EventSender,
}

impl AppState {
    pub fn new(registry: ToolRegistry, results: Arc<dyn ArtifactStore>, event_tx: EventSender) -> Self {
        Self {
            registry: Arc::new(registry),
            results,
            event_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.event_tx.subscribe()
    }
}

pub type SharedState = Arc<AppState>;
