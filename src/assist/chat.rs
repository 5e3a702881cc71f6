use tracing::debug;

use super::run_prompt;
use crate::analyze::generation::AiCapability;
use crate::error::GenerationError;

pub fn chat_prompt(question: &str) -> String {
    format!("You are a helpful campus assistant. Answer this question clearly and concisely:\n\n{question}")
}

/// Single-turn campus Q&A ("doubt solver").
pub struct ChatAssistant {
    ai: AiCapability,
}

impl ChatAssistant {
    pub fn new(ai: AiCapability) -> Self {
        Self { ai }
    }

    pub async fn ask(&self, question: &str) -> Result<String, GenerationError> {
        debug!(target: "assist", chars = question.chars().count(), "chat question");
        run_prompt(&self.ai, &chat_prompt(question.trim())).await
    }
}
