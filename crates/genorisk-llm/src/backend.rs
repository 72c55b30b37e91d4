//! Inference endpoint trait and concrete implementations.
//!
//! Backends:
//!   OpenAiCompatibleBackend: any `/chat/completions` endpoint; `nvidia_nim`
//!                            targets NVIDIA's hosted catalogue
//!   ScriptedBackend:         canned replies for tests and offline runs

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

pub const NVIDIA_NIM_BASE_URL: &str = "https://integrate.api.nvidia.com/v1";

pub const DEFAULT_TEMPERATURE: f32 = 0.6;
pub const DEFAULT_TOP_P: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Short names accepted wherever a model id is expected.
const MODEL_ALIASES: [(&str, &str); 3] = [
    ("deepseek", "deepseek-ai/deepseek-r1"),
    ("nemotron", "nvidia/llama-3.1-nemotron-ultra-253b-v1"),
    ("palmyra", "writer/palmyra-med-70b-32k"),
];

/// Map a short alias (case-insensitive) to its full model id; anything else
/// is passed through unchanged.
pub fn resolve_model(name: &str) -> String {
    let trimmed = name.trim();
    MODEL_ALIASES
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(trimmed))
        .map(|(_, id)| (*id).to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("API error [{status}]: {message}")]
    Api { status: u16, message: String },
    #[error("Endpoint not configured: {0}")]
    NotConfigured(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

// ── Request / Response ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String, // "system" | "user" | "assistant"
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".into(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub messages: Vec<Message>,
    /// Model id or alias; the endpoint default when absent.
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
}

impl InferenceRequest {
    /// Single user turn with default sampling.
    pub fn user(content: impl Into<String>) -> Self {
        Self { messages: vec![Message::user(content)], ..Default::default() }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub content: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

// ── Trait ─────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait InferenceEndpoint: Send + Sync {
    async fn complete(&self, req: InferenceRequest) -> Result<InferenceResponse, InferenceError>;
    /// Model used when a request names none.
    fn model_id(&self) -> &str;
}

// ── Helper: parse OpenAI-style response ──────────────────────────────────────

fn parse_openai_response(json: &serde_json::Value, fallback_model: &str) -> InferenceResponse {
    InferenceResponse {
        content: json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string(),
        model: json["model"].as_str().unwrap_or(fallback_model).to_string(),
        prompt_tokens: json["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
        completion_tokens: json["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
    }
}

/// Turn a non-2xx reply into [`InferenceError::Api`], otherwise decode the body.
pub(crate) async fn check_response_status(resp: reqwest::Response) -> Result<serde_json::Value, InferenceError> {
    let status = resp.status().as_u16();
    let text = resp.text().await?;
    if status >= 400 {
        return Err(InferenceError::Api { status, message: api_error_message(&text) });
    }
    Ok(serde_json::from_str(&text)?)
}

fn api_error_message(body: &str) -> String {
    let json: serde_json::Value = serde_json::from_str(body).unwrap_or_default();
    json["error"]["message"]
        .as_str()
        .or_else(|| json["detail"].as_str())
        .or_else(|| json["message"].as_str())
        .map(str::to_string)
        .unwrap_or_else(|| body.chars().take(200).collect())
}

// ── OpenAI-compatible (NVIDIA NIM, vLLM, LMStudio, …) ───────────────────────

pub struct OpenAiCompatibleBackend {
    pub base_url: String,
    pub model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatibleBackend {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: resolve_model(&model.into()),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// NVIDIA's hosted endpoint, defaulting to the DeepSeek-R1 model.
    pub fn nvidia_nim(api_key: Option<String>) -> Self {
        Self::new(NVIDIA_NIM_BASE_URL, "deepseek", api_key)
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(k) => req.bearer_auth(k),
            None => req,
        }
    }

    fn request_body(&self, req: &InferenceRequest) -> serde_json::Value {
        let model = req.model.as_deref().map(resolve_model).unwrap_or_else(|| self.model.clone());
        serde_json::json!({
            "model":       model,
            "messages":    req.messages,
            "temperature": req.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            "top_p":       req.top_p.unwrap_or(DEFAULT_TOP_P),
            "max_tokens":  req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "stream":      false,
        })
    }
}

#[async_trait]
impl InferenceEndpoint for OpenAiCompatibleBackend {
    #[instrument(skip(self, req), fields(base_url = %self.base_url))]
    async fn complete(&self, req: InferenceRequest) -> Result<InferenceResponse, InferenceError> {
        if req.messages.is_empty() {
            return Err(InferenceError::InvalidInput("request has no messages".into()));
        }
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = self.request_body(&req);
        debug!(model = %body["model"], "Sending chat completion");
        let resp = self.auth(self.client.post(&url)).json(&body).send().await?;
        let json = check_response_status(resp).await?;
        Ok(parse_openai_response(&json, &self.model))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// ── Scripted (tests, offline) ───────────────────────────────────────────────

/// Replies from a queue, then falls back to a fixed reply. Records every
/// request it receives.
pub struct ScriptedBackend {
    model: String,
    replies: Mutex<VecDeque<Result<String, String>>>,
    fallback: String,
    seen: Mutex<Vec<InferenceRequest>>,
}

impl ScriptedBackend {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            model: "scripted".into(),
            replies: Mutex::new(VecDeque::new()),
            fallback: fallback.into(),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Queue one successful reply.
    pub fn then_reply(self, content: impl Into<String>) -> Self {
        self.push(Ok(content.into()))
    }

    /// Queue one failure, surfaced as a 500 API error.
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()))
    }

    fn push(self, reply: Result<String, String>) -> Self {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(reply);
        }
        self
    }

    pub fn requests(&self) -> Vec<InferenceRequest> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl InferenceEndpoint for ScriptedBackend {
    async fn complete(&self, req: InferenceRequest) -> Result<InferenceResponse, InferenceError> {
        let model = req.model.as_deref().map(resolve_model).unwrap_or_else(|| self.model.clone());
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(req);
        }
        let next = self.replies.lock().ok().and_then(|mut q| q.pop_front());
        match next.unwrap_or_else(|| Ok(self.fallback.clone())) {
            Ok(content) => Ok(InferenceResponse {
                completion_tokens: content.split_whitespace().count() as u32,
                content,
                model,
                prompt_tokens: 0,
            }),
            Err(message) => Err(InferenceError::Api { status: 500, message }),
        }
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
