use serde::{Deserialize, Serialize};

use super::run_prompt;
use crate::analyze::generation::AiCapability;
use crate::error::GenerationError;

/// Smart-post text transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RewriteAction {
    #[default]
    Improve,
    Expand,
    Summarize,
    Translate,
}

impl RewriteAction {
    pub fn prompt(&self, input: &str) -> String {
        let lead = match self {
            RewriteAction::Improve => "Improve this text to make it clearer and more professional",
            RewriteAction::Expand => "Expand this text with more details and examples",
            RewriteAction::Summarize => "Summarize this text in 2-3 sentences",
            RewriteAction::Translate => "Translate this text to simple English",
        };
        format!("{lead}:\n\n{input}")
    }
}

pub struct Rewriter {
    ai: AiCapability,
}

impl Rewriter {
    pub fn new(ai: AiCapability) -> Self {
        Self { ai }
    }

    pub async fn rewrite(&self, action: RewriteAction, input: &str) -> Result<String, GenerationError> {
        run_prompt(&self.ai, &action.prompt(input)).await
    }
}
