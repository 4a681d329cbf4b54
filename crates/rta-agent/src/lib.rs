//! LLM-backed collaborators for RTA.
//!
//! The engine in `rta-intent` never talks to a model directly.  This crate
//! supplies the implementations of its language collaborators:
//!
//! ```text
//! ┌──────────────┐     ┌──────────┐     ┌────────────────────┐
//! │ LlmAssistant │────>│ prompts  │     │ OpenAI-compatible  │
//! │ (5 services) │────>│ ChatModel│────>│ endpoint (Groq)    │
//! └──────────────┘     └──────────┘     └────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`llm`] -- LLM client and wire types.
//! - [`prompts`] -- Prompt builders for each collaborator operation.
//! - [`assistant`] -- [`LlmAssistant`], implementing query generation,
//!   summarization, fallback answering, small talk and condition
//!   translation.
//! - [`error`] -- Agent error types.

pub mod assistant;
pub mod error;
pub mod llm;
pub mod prompts;

// Re-export the most commonly used types at the crate root.
pub use assistant::LlmAssistant;
pub use error::{AgentError, Result};
pub use llm::{ChatModel, ChatRequest, ChatResponse, LlmClient, LlmClientConfig, Message, Role};
