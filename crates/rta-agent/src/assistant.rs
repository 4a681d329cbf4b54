//! The LLM-backed collaborator.
//!
//! [`LlmAssistant`] implements every language collaborator interface the
//! engine needs on top of one [`ChatModel`].  Each operation builds its
//! prompt with [`crate::prompts`], makes one model call, and maps failures
//! onto the [`KernelError`] variant naming that operation.

use std::sync::Arc;

use async_trait::async_trait;

use rta_kernel::{
    ConditionTranslator, Conversationalist, FallbackAnswerer, KernelError, QueryGenerator, Source,
    Summarizer,
};

use crate::llm::ChatModel;
use crate::prompts;

/// Language collaborators backed by a chat model.
#[derive(Clone)]
pub struct LlmAssistant {
    model: Arc<dyn ChatModel>,
}

impl LlmAssistant {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl QueryGenerator for LlmAssistant {
    async fn generate(
        &self,
        question: &str,
        source: Source,
        schema: &[&str],
    ) -> rta_kernel::Result<String> {
        let text = self
            .model
            .complete(prompts::query_generation(question, source, schema))
            .await
            .map_err(|e| KernelError::QueryGeneration {
                reason: e.to_string(),
            })?;
        tracing::debug!(source = %source, query = %text, "query generated by model");
        Ok(text)
    }
}

#[async_trait]
impl Summarizer for LlmAssistant {
    async fn summarize(&self, question: &str, result: &str) -> rta_kernel::Result<String> {
        self.model
            .complete(prompts::summarization(question, result))
            .await
            .map_err(|e| KernelError::Summarization {
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl FallbackAnswerer for LlmAssistant {
    async fn answer(&self, question: &str) -> rta_kernel::Result<String> {
        Ok(self.model.complete(prompts::fallback(question)).await?)
    }
}

#[async_trait]
impl Conversationalist for LlmAssistant {
    async fn reply(&self, message: &str) -> rta_kernel::Result<String> {
        Ok(self.model.complete(prompts::conversation(message)).await?)
    }
}

#[async_trait]
impl ConditionTranslator for LlmAssistant {
    async fn translate(&self, instruction: &str, vocabulary: &[&str]) -> rta_kernel::Result<String> {
        let text = self
            .model
            .complete(prompts::condition_translation(instruction, vocabulary))
            .await
            .map_err(|e| KernelError::Translation {
                reason: e.to_string(),
            })?;
        tracing::debug!(condition = %text, "condition translated by model");
        Ok(text)
    }
}
