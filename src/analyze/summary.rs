//! Summarizer: one-sentence synopsis for long bodies. AI only, no local fallback.

use tracing::warn;

use super::generation::AiCapability;

/// Bodies shorter than this (in chars) are not summarized.
pub const MIN_SUMMARY_CHARS: usize = 200;

pub fn summary_prompt(body: &str) -> String {
    format!("Summarize this in one short sentence (max 15 words):\n\n{body}")
}

pub fn is_long_enough(body: &str) -> bool {
    body.chars().count() >= MIN_SUMMARY_CHARS
}

pub struct Summarizer {
    ai: AiCapability,
}

impl Summarizer {
    pub fn new(ai: AiCapability) -> Self {
        Self { ai }
    }

    /// `None` for short bodies, without a credential, or on any failure.
    pub async fn summarize(&self, body: &str) -> Option<String> {
        if !is_long_enough(body) {
            return None;
        }
        let generator = self.ai.generator()?;
        match generator.generate(&summary_prompt(body)).await {
            Ok(text) => {
                let text = text.trim();
                (!text.is_empty()).then(|| text.to_string())
            }
            Err(e) => {
                warn!(target: "summary", error = %e, "summary generation failed");
                None
            }
        }
    }
}
