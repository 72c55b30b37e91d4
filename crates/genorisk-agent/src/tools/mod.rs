//! Tool registry for Genorisk.
//!
//! Every capability the server exposes is a `GenoriskTool` registered in a
//! central `ToolRegistry`. The HTTP layer only knows tool names and JSON.
//!
//! Tool lifecycle:
//!   1. Implement `GenoriskTool` for your type.
//!   2. Register with `ToolRegistry::register`.
//!   3. Callers invoke tools via `ToolRegistry::invoke(name, params)`.

pub mod chat_tool;
pub mod dna_tool;
pub mod research_tool;
pub mod risk_tool;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use genorisk_llm::{Evo2Client, InferenceEndpoint, OpenAiCompatibleBackend};
use genorisk_research::{GoogleSearchClient, GwasCatalogClient, ResearchPipeline};
use genorisk_scorer::{GenotypeLoader, WeightTable};
use secrecy::ExposeSecret;
use serde_json::Value;
use thiserror::Error;

use crate::config::Config;

// ─────────────────────────────────────────────
//  Errors
// ─────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Required string parameter, trimmed and non-empty.
pub(crate) fn required_str<'a>(params: &'a Value, key: &str) -> anyhow::Result<&'a str> {
    match params[key].as_str().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ToolError::InvalidParams(format!("'{key}' must be a non-empty string")).into()),
    }
}

// ─────────────────────────────────────────────
//  Core trait: implement for each Genorisk tool
// ─────────────────────────────────────────────

/// A callable Genorisk tool.
///
/// - `name()` must be unique across the registry (snake_case).
/// - `description()` is surfaced in the manifest for planners and clients.
/// - `parameters_schema()` returns a JSON Schema object for the input.
/// - `invoke()` receives the JSON params and returns JSON output.
#[async_trait]
pub trait GenoriskTool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters_schema(&self) -> Value;

    /// Parameter problems should be reported as [`ToolError::InvalidParams`].
    async fn invoke(&self, params: Value) -> anyhow::Result<Value>;

    /// Tools that read patient-level data return "CONFIDENTIAL".
    fn output_data_class(&self) -> &str { "PUBLIC" }
}

// ─────────────────────────────────────────────
//  Tool registry
// ─────────────────────────────────────────────

/// Central registry mapping tool names → trait objects.
/// Build once at startup, then share via Arc.
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn GenoriskTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: BTreeMap::new() }
    }

    /// Register a tool. Panics if the name is already registered.
    pub fn register<T: GenoriskTool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        assert!(
            !self.tools.contains_key(&name),
            "Duplicate tool name: {name}"
        );
        self.tools.insert(name, Arc::new(tool));
    }

    /// Invoke a registered tool by name.
    pub async fn invoke(&self, name: &str, params: Value) -> Result<Value, ToolError> {
        let tool = self.tools.get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        tracing::info!(
            tool = name,
            data_class = tool.output_data_class(),
            "Invoking tool"
        );

        tool.invoke(params).await.map_err(|e| match e.downcast::<ToolError>() {
            Ok(tool_err) => tool_err,
            Err(other) => ToolError::Failed(other),
        })
    }

    /// All registered tools as a JSON manifest, sorted by name.
    pub fn manifest(&self) -> Value {
        let tools: Vec<Value> = self.tools.values().map(|t| describe(t.as_ref())).collect();
        serde_json::json!({ "tools": tools })
    }

    /// Manifest entry for one tool.
    pub fn describe(&self, name: &str) -> Option<Value> {
        self.get(name).map(|t| describe(t.as_ref()))
    }

    pub fn len(&self) -> usize { self.tools.len() }

    pub fn is_empty(&self) -> bool { self.tools.is_empty() }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn GenoriskTool>> {
        self.tools.get(name)
    }
}

fn describe(tool: &dyn GenoriskTool) -> Value {
    serde_json::json!({
        "name": tool.name(),
        "description": tool.description(),
        "parameters": tool.parameters_schema(),
        "output_data_class": tool.output_data_class(),
    })
}

impl Default for ToolRegistry {
    fn default() -> Self { Self::new() }
}

/// Build the default Genorisk tool registry from configuration.
pub async fn build_default_registry(config: &Config) -> anyhow::Result<ToolRegistry> {
    let nvidia_key = config.secrets.nvidia_api_key.as_ref().map(|k| k.expose_secret().to_string());
    if nvidia_key.is_none() {
        tracing::warn!("NVIDIA_API_KEY not set; chat, summaries and DNA generation are unavailable");
    }

    let llm: Option<Arc<dyn InferenceEndpoint>> = nvidia_key.clone().map(|key| {
        Arc::new(OpenAiCompatibleBackend::new(&config.llm.base_url, &config.llm.chat_model, Some(key)))
            as Arc<dyn InferenceEndpoint>
    });

    let reference = match &config.scoring.reference_weights {
        Some(path) => {
            let table = WeightTable::load(path)
                .await
                .with_context(|| format!("loading reference weights from {path}"))?;
            tracing::info!(conditions = ?table.conditions(), "Reference weights ready");
            Some(Arc::new(table))
        }
        None => None,
    };
    let loader = GenotypeLoader::new().with_delimiter(config.scoring.delimiter()?);

    let gwas = GwasCatalogClient::with_base_url(&config.research.gwas_base_url)
        .with_limits(config.research.max_studies, config.research.max_results)
        .with_request_delay(Duration::from_millis(config.research.request_delay_ms));
    let search = GoogleSearchClient::new(
        config.secrets.google_search_api_key.clone(),
        config.secrets.google_custom_search_cx.clone(),
    );
    if !search.is_configured() {
        tracing::warn!("Google Custom Search not configured; web research will be skipped");
    }
    let pipeline = ResearchPipeline::new(Arc::new(gwas), Arc::new(search), llm.clone())
        .with_summary_model(&config.llm.summary_model);

    let mut reg = ToolRegistry::new();
    reg.register(risk_tool::RiskProfileTool::new(loader, reference));
    reg.register(research_tool::DeepResearchTool::new(Arc::new(pipeline)));
    reg.register(chat_tool::ChatTool::new(llm, &config.llm.chat_model));
    reg.register(dna_tool::DnaGeneratorTool::new(Arc::new(Evo2Client::new(nvidia_key))));
    tracing::info!("ToolRegistry ready with {} tools", reg.len());
    Ok(reg)
}

// ─────────────────────────────────────────────
//  Tests
// ─────────────────────────────────────────────
