//! Tool registration for foldrun.
//!
//! Each pipeline operation is exposed as a `FoldTool` behind a central
//! `ToolRegistry`. The HTTP layer lists tools through `manifest()` and calls
//! them by name through `invoke()`.
//!
//! Tool lifecycle:
//!   1. Implement `FoldTool` for your type.
//!   2. Register with `ToolRegistry::register`.
//!   3. Callers invoke tools via `ToolRegistry::invoke(name, params)`.

pub mod fold_tools;
pub mod input_tools;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use foldrun_core::pipeline::FoldingPipeline;
use foldrun_core::FoldError;
use serde_json::Value;

// ─────────────────────────────────────────────
//  Core trait, implemented for each foldrun tool
// ─────────────────────────────────────────────

/// A callable pipeline operation.
///
/// # Minimal contract
/// - `name()` must be unique across the registry (snake_case, e.g. `"compute_fold"`).
/// - `description()` is shown to callers in the manifest.
/// - `parameters_schema()` returns a JSON Schema object for the params.
/// - `invoke()` receives JSON params and returns JSON output.
#[async_trait]
pub trait FoldTool: Send + Sync {
    /// Unique tool name (used as the call identifier).
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema describing the expected input parameters.
    fn parameters_schema(&self) -> Value;

    async fn invoke(&self, params: Value) -> Result<Value>;

    /// Whether the tool reaches an external service (asset host, GPU backend).
    fn requires_approval(&self) -> bool {
        false
    }
}

// ─────────────────────────────────────────────
//  Tool registry
// ─────────────────────────────────────────────

/// Central registry mapping tool names → trait objects.
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn FoldTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: BTreeMap::new() }
    }

    /// Register a tool. Panics if the name is already registered.
    pub fn register<T: FoldTool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        assert!(!self.tools.contains_key(&name), "Duplicate tool name: {name}");
        self.tools.insert(name, Arc::new(tool));
    }

    /// Invoke a registered tool by name.
    pub async fn invoke(&self, name: &str, params: Value) -> Result<Value> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown tool: {name}"))?;

        tracing::info!(
            tool = name,
            requires_approval = tool.requires_approval(),
            "Invoking tool"
        );

        tool.invoke(params).await
    }

    /// All registered tools as a JSON manifest, sorted by name.
    pub fn manifest(&self) -> Value {
        let tools: Vec<Value> = self
            .tools
            .values()
            .map(|t| {
                serde_json::json!({
                    "name": t.name(),
                    "description": t.description(),
                    "parameters": t.parameters_schema(),
                    "requires_approval": t.requires_approval(),
                })
            })
            .collect();
        serde_json::json!({ "tools": tools })
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn FoldTool>> {
        self.tools.get(name)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the registry holding every pipeline operation.
pub fn build_default_registry(pipeline: Arc<FoldingPipeline>, number_of_scores: usize) -> ToolRegistry {
    let mut reg = ToolRegistry::new();
    reg.register(input_tools::CreateFastaFileTool::new(pipeline.clone()));
    reg.register(input_tools::CreateJsonConfigTool::new(pipeline.clone()));
    reg.register(fold_tools::FetchDependenciesTool::new(pipeline.clone()));
    reg.register(fold_tools::ComputeFoldTool::new(pipeline.clone()));
    reg.register(fold_tools::SelectBestModelTool::new(pipeline, number_of_scores));
    tracing::info!("ToolRegistry ready with {} tools", reg.len());
    reg
}

/// Optional string parameter; blank strings count as absent.
pub(crate) fn opt_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params[key].as_str().map(str::trim).filter(|s| !s.is_empty())
}

pub(crate) fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    opt_str(params, key)
        .ok_or_else(|| FoldError::InvalidInput(format!("missing required parameter `{key}`")).into())
}

/// Optional unsigned parameter; a present value of the wrong type is an error.
pub(crate) fn opt_u64(params: &Value, key: &str) -> Result<Option<u64>> {
    match &params[key] {
        Value::Null => Ok(None),
        v => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| FoldError::InvalidInput(format!("`{key}` must be a non-negative integer")).into()),
    }
}

// ─────────────────────────────────────────────
//  Tests
// ─────────────────────────────────────────────
