//! HTTP chat backends for the ensemble pipeline.
//!
//! Each configured provider becomes a [`ContractAdapter`]: a [`ChatBackend`]
//! (Anthropic, OpenAI or Gemini) plus prompt framing, JSON extraction and
//! contract validation. Failures come back as `ProviderOutcome` values, never
//! as errors.

pub mod adapter;
pub mod anthropic;
pub mod chat;
pub mod error;
pub mod extract;
pub mod gemini;
mod http;
pub mod openai;
pub mod prompt;
pub mod registry;

pub use adapter::ContractAdapter;
pub use anthropic::AnthropicBackend;
pub use chat::{ChatBackend, ChatParams, ChatRequest, ChatResponse, Message, Role};
pub use error::LlmError;
pub use extract::extract_json;
pub use gemini::GeminiBackend;
pub use openai::OpenAiBackend;
pub use registry::{build_adapter, build_backend, build_registry, build_registry_with};
