//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use foldrun_core::store::{ArtifactStore, ArtifactWriter, LocalStore};
use foldrun_core::Result;

/// Serve `router` on an ephemeral local port and return its address.
pub async fn spawn_server(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Local store that counts commits.
pub struct RecordingStore {
    inner: LocalStore,
    commits: AtomicUsize,
}

impl RecordingStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            inner: LocalStore::new(root),
            commits: AtomicUsize::new(0),
        }
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactStore for RecordingStore {
    fn locate(&self, key: &str) -> Result<PathBuf> {
        self.inner.locate(key)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.inner.exists(key).await
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<PathBuf> {
        self.inner.write(key, bytes).await
    }

    async fn create(&self, key: &str) -> Result<ArtifactWriter> {
        self.inner.create(key).await
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.inner.rename(from, to).await
    }

    async fn commit(&self) -> Result<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        self.inner.commit().await
    }
}
