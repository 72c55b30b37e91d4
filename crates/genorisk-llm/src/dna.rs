//! DNA sequence generation with the Evo2-40B model hosted by NVIDIA.
//!
//! The model extends an input sequence by a fixed number of bases and reports
//! per-base sampling probabilities.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::backend::{check_response_status, InferenceError};

pub const EVO2_GENERATE_URL: &str = "https://health.api.nvidia.com/v1/biology/arc/evo2-40b/generate";

const NUM_TOKENS: u32 = 16;
const TOP_K: u32 = 1;

/// Evo2 reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedSequence {
    #[serde(default)]
    pub sequence: String,
    #[serde(default)]
    pub logits: Option<serde_json::Value>,
    #[serde(default)]
    pub sampled_probs: Vec<f64>,
    #[serde(default)]
    pub elapsed_ms: u64,
}

#[async_trait]
pub trait SequenceGenerator: Send + Sync {
    async fn generate(&self, sequence: &str) -> Result<GeneratedSequence, InferenceError>;
}

/// Upper-cased input if it is a non-empty A/C/G/T string.
pub fn validate_sequence(sequence: &str) -> Result<String, InferenceError> {
    let seq = sequence.trim().to_ascii_uppercase();
    if seq.is_empty() {
        return Err(InferenceError::InvalidInput("sequence is empty".into()));
    }
    if let Some((pos, c)) = seq.char_indices().find(|(_, c)| !matches!(c, 'A' | 'C' | 'G' | 'T')) {
        return Err(InferenceError::InvalidInput(format!(
            "sequence contains '{c}' at position {pos}; only A, C, G and T are allowed"
        )));
    }
    Ok(seq)
}

pub struct Evo2Client {
    url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl Evo2Client {
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_url(EVO2_GENERATE_URL, api_key)
    }

    pub fn with_url(url: impl Into<String>, api_key: Option<String>) -> Self {
        Self { url: url.into(), api_key, client: reqwest::Client::new() }
    }

    fn request_body(sequence: &str) -> serde_json::Value {
        serde_json::json!({
            "sequence": sequence,
            "num_tokens": NUM_TOKENS,
            "top_k": TOP_K,
            "enable_sampled_probs": true,
        })
    }
}

#[async_trait]
impl SequenceGenerator for Evo2Client {
    #[instrument(skip(self, sequence), fields(input_len = sequence.len()))]
    async fn generate(&self, sequence: &str) -> Result<GeneratedSequence, InferenceError> {
        let seq = validate_sequence(sequence)?;
        let Some(key) = &self.api_key else {
            return Err(InferenceError::NotConfigured("NVIDIA_API_KEY is not set".into()));
        };

        info!("Requesting Evo2 generation; the hosted queue may take a while");
        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(key)
            .json(&Self::request_body(&seq))
            .send()
            .await?;
        let json = check_response_status(resp).await?;
        let generated: GeneratedSequence = serde_json::from_value(json)?;
        info!(
            generated_len = generated.sequence.len(),
            elapsed_ms = generated.elapsed_ms,
            "Evo2 generation complete"
        );
        Ok(generated)
    }
}
