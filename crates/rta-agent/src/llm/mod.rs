//! LLM integration layer.
//!
//! - [`types`] -- Core data types (messages, requests, usage).
//! - [`client`] -- HTTP client for OpenAI-compatible chat completions and
//!   the [`ChatModel`] seam the assistant is written against.

pub mod client;
pub mod types;

// Re-export the most commonly used types for convenience.
pub use client::{ChatModel, DEFAULT_MODEL, GROQ_BASE_URL, LlmClient, LlmClientConfig};
pub use types::{ChatRequest, ChatResponse, Message, Role, Usage};
