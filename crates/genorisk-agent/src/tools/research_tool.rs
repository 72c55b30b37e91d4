//! Tool: deep genetic research for one condition.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use genorisk_research::ResearchPipeline;
use serde_json::Value;

use super::{required_str, GenoriskTool};

pub struct DeepResearchTool {
    pipeline: Arc<ResearchPipeline>,
}

impl DeepResearchTool {
    pub fn new(pipeline: Arc<ResearchPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl GenoriskTool for DeepResearchTool {
    fn name(&self) -> &str { "deep_genetic_research" }

    fn description(&self) -> &str {
        "Research a medical condition: GWAS Catalog variant associations, web \
         snippets per variant and a model-written summary. The rsIDs returned \
         here are the ones to pass to assess_patient_genetic_risk_profile."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "condition": { "type": "string", "description": "Condition or trait, e.g. \"type 2 diabetes\"" }
            },
            "required": ["condition"]
        })
    }

    async fn invoke(&self, params: Value) -> Result<Value> {
        let condition = required_str(&params, "condition")?;
        let outcome = self.pipeline.run(condition).await;
        Ok(serde_json::to_value(outcome)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genorisk_llm::{InferenceEndpoint, ScriptedBackend};
    use genorisk_research::MockWebSearch;
    use genorisk_scorer::catalogue::MockCatalogue;
    use genorisk_test_utils::fixtures;

    use crate::tools::ToolError;

    fn tool() -> DeepResearchTool {
        let catalogue = MockCatalogue::new()
            .with("migraine", fixtures::variant("rs10166942", Some("T"), Some(1.2)));
        let search = MockWebSearch::new().with("rs10166942", "TRPM8 locus");
        let llm: Arc<dyn InferenceEndpoint> = Arc::new(ScriptedBackend::new("summary text"));
        DeepResearchTool::new(Arc::new(ResearchPipeline::new(Arc::new(catalogue), Arc::new(search), Some(llm))))
    }

    #[tokio::test]
    async fn test_research_outcome_serialised() {
        let out = tool().invoke(serde_json::json!({ "condition": "Migraine" })).await.unwrap();

        assert_eq!(out["condition"], "Migraine");
        assert_eq!(out["report"]["identified_rsids"][0], "rs10166942");
        assert_eq!(out["report"]["web_research_summary"]["rs10166942"], "TRPM8 locus");
        assert_eq!(out["llm_summary"], "summary text");
        assert!(out["error"].is_null());
        assert_eq!(out["status"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_research_requires_condition() {
        let err = tool().invoke(serde_json::json!({ "condition": "   " })).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<ToolError>(), Some(ToolError::InvalidParams(_))));
    }
}
