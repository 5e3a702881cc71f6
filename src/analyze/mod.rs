// src/analyze/mod.rs
//! Content intelligence pipeline: moderation verdict, optional summary and
//! best-fit category for a post, with deterministic fallbacks when the
//! generation service is unavailable.

pub mod category;
pub mod composite;
pub mod deadline;
pub mod generation;
pub mod moderation;
pub mod summary;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ai::AnalysisMode;
use crate::config::rules::ContentRules;

// Re-export convenient types.
pub use category::{AutoCategorizer, Category};
pub use composite::{CompositeAnalysis, CompositeAnalyzer};
pub use deadline::{analyze_with_deadline, DeadlineOutcome};
pub use generation::{AiCapability, GeminiClient, RetryPolicy, SharedGenerator, TextGenerator};
pub use moderation::{ModerationEvaluator, ModerationResult};
pub use summary::Summarizer;

/// Per-invocation input; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub title: String,
    pub body: String,
}

impl AnalysisRequest {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    /// "title body", the text the keyword rules look at.
    pub fn joined(&self) -> String {
        format!("{} {}", self.title, self.body)
    }
}

/// What the pipeline hands back to the post-creation flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostAnalysis {
    pub flagged: bool,
    pub reason: Option<String>,
    pub summary: Option<String>,
    pub category: Category,
}

impl From<CompositeAnalysis> for PostAnalysis {
    fn from(c: CompositeAnalysis) -> Self {
        Self {
            flagged: c.flagged,
            reason: c.flagged.then(|| moderation::AI_REASON.to_string()),
            summary: c.summary,
            category: c.category,
        }
    }
}

/// Facade over the evaluators. Exactly one mode is live per instance.
pub struct ContentPipeline {
    mode: AnalysisMode,
    moderation: ModerationEvaluator,
    summarizer: Summarizer,
    categorizer: AutoCategorizer,
    composite: CompositeAnalyzer,
}

impl ContentPipeline {
    pub fn new(rules: Arc<ContentRules>, ai: AiCapability, mode: AnalysisMode) -> Self {
        Self {
            mode,
            moderation: ModerationEvaluator::new(rules.clone(), ai.clone()),
            summarizer: Summarizer::new(ai.clone()),
            categorizer: AutoCategorizer::new(rules, ai.clone()),
            composite: CompositeAnalyzer::new(ai),
        }
    }

    pub fn mode(&self) -> AnalysisMode {
        self.mode
    }

    pub fn moderation(&self) -> &ModerationEvaluator {
        &self.moderation
    }

    /// Never fails: every evaluator resolves errors to its own default.
    pub async fn analyze(&self, req: &AnalysisRequest) -> PostAnalysis {
        debug!(target: "analyze", id = %anon_hash(&req.joined()), mode = ?self.mode, "analysis start");
        match self.mode {
            AnalysisMode::Composite => self.composite.analyze(req).await.into(),
            AnalysisMode::Separate => {
                let (verdict, summary, category) = tokio::join!(
                    self.moderation.evaluate(req),
                    self.summarizer.summarize(&req.body),
                    self.categorizer.categorize(req),
                );
                PostAnalysis {
                    flagged: verdict.flagged,
                    reason: verdict.reason,
                    summary,
                    category,
                }
            }
        }
    }
}

/// Short, stable, non-reversible id for log lines; raw post text is never logged.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
