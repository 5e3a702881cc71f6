//! Composite analyzer: flag, summary and category in one round trip.
//!
//! The payload is accepted whole or not at all. Any parse or validation
//! failure resolves to [`CompositeAnalysis::safe_default`].

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::category::Category;
use super::generation::AiCapability;
use super::AnalysisRequest;
use crate::error::CompositeParseError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeAnalysis {
    pub flagged: bool,
    pub summary: Option<String>,
    pub category: Category,
}

impl CompositeAnalysis {
    pub fn safe_default() -> Self {
        Self {
            flagged: false,
            summary: None,
            category: Category::General,
        }
    }
}

impl Default for CompositeAnalysis {
    fn default() -> Self {
        Self::safe_default()
    }
}

pub fn composite_prompt(req: &AnalysisRequest) -> String {
    format!(
        "Analyze this student post and reply with ONLY a JSON object with exactly these keys:\n\
         \"flagged\": true if it contains spam, toxicity, or inappropriate content, otherwise false;\n\
         \"summary\": a summary of the post in at most ten words;\n\
         \"category\": one of Notes, Doubts, Opportunities, Events, General.\n\n\
         Title: {}\nContent: {}",
        req.title, req.body
    )
}

/// Remove a surrounding Markdown code fence (```json ... ```), if any.
pub fn strip_code_fence(raw: &str) -> &str {
    static RE_FENCE: OnceCell<Regex> = OnceCell::new();
    let re = RE_FENCE.get_or_init(|| {
        Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*\s*(.*?)\s*```\s*$").expect("fence regex")
    });
    match re.captures(raw).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => raw.trim(),
    }
}

/// Strict parse of the model payload.
pub fn parse_composite(raw: &str) -> Result<CompositeAnalysis, CompositeParseError> {
    let body = strip_code_fence(raw);
    let value: Value = serde_json::from_str(body)
        .map_err(|e| CompositeParseError::InvalidJson(e.to_string()))?;
    let obj = value.as_object().ok_or(CompositeParseError::NotAnObject)?;

    let flagged = obj
        .get("flagged")
        .ok_or(CompositeParseError::MissingKey("flagged"))?
        .as_bool()
        .ok_or(CompositeParseError::WrongType {
            key: "flagged",
            expected: "boolean",
        })?;

    let summary = match obj
        .get("summary")
        .ok_or(CompositeParseError::MissingKey("summary"))?
    {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Null => None,
        _ => {
            return Err(CompositeParseError::WrongType {
                key: "summary",
                expected: "string",
            })
        }
    };

    let label = obj
        .get("category")
        .ok_or(CompositeParseError::MissingKey("category"))?
        .as_str()
        .ok_or(CompositeParseError::WrongType {
            key: "category",
            expected: "string",
        })?;
    let category = Category::from_model_label(label)
        .ok_or_else(|| CompositeParseError::UnknownCategory(label.to_string()))?;

    Ok(CompositeAnalysis {
        flagged,
        summary,
        category,
    })
}

pub struct CompositeAnalyzer {
    ai: AiCapability,
}

impl CompositeAnalyzer {
    pub fn new(ai: AiCapability) -> Self {
        Self { ai }
    }

    pub async fn analyze(&self, req: &AnalysisRequest) -> CompositeAnalysis {
        let Some(generator) = self.ai.generator() else {
            return CompositeAnalysis::safe_default();
        };

        let raw = match generator.generate(&composite_prompt(req)).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(target: "composite", error = %e, "composite analysis call failed");
                return CompositeAnalysis::safe_default();
            }
        };

        match parse_composite(&raw) {
            Ok(a) => a,
            Err(e) => {
                debug!(target: "composite", error = %e, "unusable composite payload");
                CompositeAnalysis::safe_default()
            }
        }
    }
}
