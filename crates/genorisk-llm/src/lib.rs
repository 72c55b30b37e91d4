//! genorisk-llm: hosted model clients.
//! Chat completion over OpenAI-compatible endpoints (NVIDIA NIM by default),
//! DNA sequence generation with Evo2, and audit entries for model calls.

pub mod backend;
pub mod dna;
pub mod audit;

pub use backend::{
    resolve_model, InferenceEndpoint, InferenceError, InferenceRequest, InferenceResponse, Message,
    OpenAiCompatibleBackend, ScriptedBackend,
};
pub use dna::{Evo2Client, GeneratedSequence, SequenceGenerator};
pub use audit::InferenceAuditEntry;
