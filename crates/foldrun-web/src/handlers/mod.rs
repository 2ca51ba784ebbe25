//! HTTP handlers for all routes.

pub mod structures;
pub mod system;
pub mod tools;
