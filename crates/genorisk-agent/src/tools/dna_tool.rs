//! Tool: extend a DNA sequence with the Evo2 model.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use genorisk_llm::{InferenceError, SequenceGenerator};
use serde_json::Value;

use super::{required_str, GenoriskTool, ToolError};

pub struct DnaGeneratorTool {
    generator: Arc<dyn SequenceGenerator>,
}

impl DnaGeneratorTool {
    pub fn new(generator: Arc<dyn SequenceGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl GenoriskTool for DnaGeneratorTool {
    fn name(&self) -> &str { "dna_generator" }

    fn description(&self) -> &str {
        "Generate a continuation of a DNA sequence (A/C/G/T) with the Evo2-40B model."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "sequence": { "type": "string", "description": "Seed DNA sequence, A/C/G/T only" }
            },
            "required": ["sequence"]
        })
    }

    async fn invoke(&self, params: Value) -> Result<Value> {
        let sequence = required_str(&params, "sequence")?;
        let generated = self.generator.generate(sequence).await.map_err(|e| match e {
            InferenceError::InvalidInput(msg) => anyhow::Error::from(ToolError::InvalidParams(msg)),
            other => anyhow::Error::from(other),
        })?;
        Ok(serde_json::to_value(generated)?)
    }
}
