//! Study assistants: thin prompt wrappers over the generation client.
//!
//! Unlike the post pipeline these surface errors to the caller, since the
//! user is waiting on the answer.

pub mod chat;
pub mod flashcards;
pub mod rewrite;

pub use chat::ChatAssistant;
pub use flashcards::{parse_flashcards, Flashcard, FlashcardGenerator};
pub use rewrite::{RewriteAction, Rewriter};

use crate::analyze::generation::AiCapability;
use crate::error::GenerationError;

/// Run a prompt if AI is configured; `Configuration` otherwise.
pub(crate) async fn run_prompt(ai: &AiCapability, prompt: &str) -> Result<String, GenerationError> {
    let generator = ai.generator().ok_or(GenerationError::Configuration)?;
    generator.generate(prompt).await
}
