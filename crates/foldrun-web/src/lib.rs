//! foldrun-web: tool registry and HTTP surface for foldrun.
//! Exposes the folding pipeline as:
//!   - named tools with JSON Schema parameters
//!   - a JSON API to list and invoke them
//!   - an SSE stream of run progress
//!   - raw structure files for the viewer

pub mod handlers;
pub mod router;
pub mod sse;
pub mod state;
pub mod tools;
