//! Audit records for model calls.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use crate::backend::InferenceResponse;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceAuditEntry {
    pub id: Uuid,
    /// Tool or pipeline step that made the call.
    pub caller: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub output_hash: String,
    pub latency_ms: u64,
    pub called_at: chrono::DateTime<Utc>,
}

impl InferenceAuditEntry {
    pub fn new(caller: impl Into<String>, response: &InferenceResponse, latency_ms: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(response.content.as_bytes());
        let output_hash = format!("{:x}", hasher.finalize());

        Self {
            id: Uuid::new_v4(),
            caller: caller.into(),
            model: response.model.clone(),
            prompt_tokens: response.prompt_tokens,
            completion_tokens: response.completion_tokens,
            output_hash,
            latency_ms,
            called_at: Utc::now(),
        }
    }

    /// Emit the entry as a structured `info` event.
    pub fn record(&self) {
        info!(
            audit_id = %self.id,
            caller = %self.caller,
            model = %self.model,
            prompt_tokens = self.prompt_tokens,
            completion_tokens = self.completion_tokens,
            latency_ms = self.latency_ms,
            output_hash = %self.output_hash,
            "Model call"
        );
    }
}
