//! foldrun-core: orchestration of remote Chai-1 structure prediction runs.
//!
//! This crate covers the local half of a folding run:
//! 1. Fetching the model weights into the shared models store
//! 2. Preparing FASTA inputs and inference configs
//! 3. Handing the job to a remote inference backend
//! 4. Persisting, scoring and ranking the returned candidates
//! 5. Selecting the best model and converting it for display

pub mod error;
pub mod store;
pub mod sequence;
pub mod config;
pub mod run_id;
pub mod fetch;
pub mod inference;
pub mod scores;
pub mod collector;
pub mod selector;
pub mod convert;
pub mod events;
pub mod pipeline;

pub use error::{FoldError, Result};
pub use run_id::RunId;
