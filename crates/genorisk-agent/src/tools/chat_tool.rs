//! Tool: free-form chat with a hosted model.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use genorisk_llm::{InferenceAuditEntry, InferenceEndpoint, InferenceRequest};
use serde_json::Value;

use super::{required_str, GenoriskTool, ToolError};

pub struct ChatTool {
    llm: Option<Arc<dyn InferenceEndpoint>>,
    default_model: String,
}

impl ChatTool {
    pub fn new(llm: Option<Arc<dyn InferenceEndpoint>>, default_model: impl Into<String>) -> Self {
        Self { llm, default_model: default_model.into() }
    }
}

#[async_trait]
impl GenoriskTool for ChatTool {
    fn name(&self) -> &str { "chat_with_model" }

    fn description(&self) -> &str {
        "Send a message to a hosted language model and return its reply. \
         Accepts full model ids or the aliases deepseek, nemotron and palmyra."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "message": { "type": "string", "description": "User message" },
                "model": {
                    "type": "string",
                    "description": "Model id or alias; defaults to the configured chat model"
                }
            },
            "required": ["message"]
        })
    }

    async fn invoke(&self, params: Value) -> Result<Value> {
        let message = required_str(&params, "message")?;
        let model = match params.get("model") {
            None | Some(Value::Null) => self.default_model.clone(),
            Some(Value::String(m)) if !m.trim().is_empty() => m.trim().to_string(),
            Some(_) => {
                return Err(ToolError::InvalidParams("'model' must be a non-empty string".into()).into());
            }
        };
        let Some(llm) = &self.llm else {
            anyhow::bail!("NVIDIA_API_KEY not configured");
        };

        let started = Instant::now();
        let resp = llm.complete(InferenceRequest::user(message).with_model(model)).await?;
        InferenceAuditEntry::new(self.name(), &resp, started.elapsed().as_millis() as u64).record();

        Ok(serde_json::json!({
            "model": resp.model,
            "response": resp.content,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genorisk_llm::ScriptedBackend;

    #[tokio::test]
    async fn test_chat_uses_default_model_alias() {
        let llm = Arc::new(ScriptedBackend::new("Hello there"));
        let tool = ChatTool::new(Some(llm.clone() as Arc<dyn InferenceEndpoint>), "nemotron");

        let out = tool.invoke(serde_json::json!({ "message": "hi" })).await.unwrap();

        assert_eq!(out["response"], "Hello there");
        assert_eq!(out["model"], genorisk_llm::resolve_model("nemotron"));
        let requests = llm.requests();
        assert_eq!(requests[0].model.as_deref(), Some("nemotron"));
        assert_eq!(requests[0].messages[0].content, "hi");
    }

    #[tokio::test]
    async fn test_chat_caller_model_wins() {
        let llm = Arc::new(ScriptedBackend::new("ok"));
        let tool = ChatTool::new(Some(llm.clone() as Arc<dyn InferenceEndpoint>), "deepseek");

        tool.invoke(serde_json::json!({ "message": "hi", "model": "vendor/custom-model" }))
            .await
            .unwrap();

        assert_eq!(llm.requests()[0].model.as_deref(), Some("vendor/custom-model"));
    }

    #[tokio::test]
    async fn test_chat_without_key_fails() {
        let tool = ChatTool::new(None, "deepseek");
        let err = tool.invoke(serde_json::json!({ "message": "hi" })).await.unwrap_err();
        assert!(err.to_string().contains("NVIDIA_API_KEY"), "{err}");
    }

    #[tokio::test]
    async fn test_chat_rejects_bad_params() {
        let tool = ChatTool::new(None, "deepseek");

        let err = tool.invoke(serde_json::json!({ "message": "" })).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<ToolError>(), Some(ToolError::InvalidParams(_))));

        let err = tool.invoke(serde_json::json!({ "message": "hi", "model": 7 })).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<ToolError>(), Some(ToolError::InvalidParams(_))));
    }

    #[tokio::test]
    async fn test_chat_backend_error_propagates() {
        let llm: Arc<dyn InferenceEndpoint> = Arc::new(ScriptedBackend::new("unused").then_fail("rate limited"));
        let tool = ChatTool::new(Some(llm), "deepseek");

        let err = tool.invoke(serde_json::json!({ "message": "hi" })).await.unwrap_err();
        assert!(err.to_string().contains("rate limited"), "{err}");
    }
}
