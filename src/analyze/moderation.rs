//! Moderation evaluator: blocklist verdict, optionally overridden by the model.
//!
//! The blocklist is the only fallback in the pipeline that can produce a
//! positive result on its own.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::generation::AiCapability;
use super::AnalysisRequest;
use crate::config::rules::ContentRules;

pub const KEYWORD_REASON: &str = "Contains inappropriate content";
pub const AI_REASON: &str = "AI detected inappropriate content";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ModerationResult {
    pub flagged: bool,
    pub reason: Option<String>,
}

impl ModerationResult {
    pub fn safe() -> Self {
        Self::default()
    }

    fn keyword(flagged: bool) -> Self {
        Self {
            flagged,
            reason: flagged.then(|| KEYWORD_REASON.to_string()),
        }
    }

    fn ai(flagged: bool) -> Self {
        Self {
            flagged,
            reason: flagged.then(|| AI_REASON.to_string()),
        }
    }
}

pub fn moderation_prompt(text: &str) -> String {
    format!(
        "Analyze this text for spam, toxicity, or inappropriate content. Reply with only \"FLAGGED\" or \"SAFE\":\n\n{text}"
    )
}

/// Only the literal token FLAGGED counts as a positive verdict.
fn parse_verdict(raw: &str) -> bool {
    raw.trim().trim_end_matches('.').eq_ignore_ascii_case("FLAGGED")
}

pub struct ModerationEvaluator {
    rules: Arc<ContentRules>,
    ai: AiCapability,
}

impl ModerationEvaluator {
    pub fn new(rules: Arc<ContentRules>, ai: AiCapability) -> Self {
        Self { rules, ai }
    }

    /// Blocklist only; no network.
    pub fn keyword_verdict(&self, text: &str) -> ModerationResult {
        let hit = self.rules.blocklist_hit(text);
        if let Some(word) = hit {
            debug!(target: "moderation", term = word, "blocklist hit");
        }
        ModerationResult::keyword(hit.is_some())
    }

    pub async fn evaluate(&self, req: &AnalysisRequest) -> ModerationResult {
        let text = req.joined();
        let fallback = self.keyword_verdict(&text);

        let Some(generator) = self.ai.generator() else {
            return fallback;
        };

        match generator.generate(&moderation_prompt(&text)).await {
            Ok(raw) => ModerationResult::ai(parse_verdict(&raw)),
            Err(e) => {
                warn!(target: "moderation", error = %e, "AI moderation unavailable; using blocklist verdict");
                fallback
            }
        }
    }
}
