//! Auto-categorizer: ordered keyword rules first, model fallback second.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::generation::AiCapability;
use super::AnalysisRequest;
use crate::config::rules::ContentRules;

/// Post categories. `Projects` exists for user selection only; it is never
/// produced by auto-tagging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Category {
    Notes,
    Doubts,
    Opportunities,
    Events,
    Projects,
    #[default]
    General,
}

impl Category {
    /// The closed set auto-tagging may return.
    pub const TAGGABLE: [Category; 5] = [
        Category::Notes,
        Category::Doubts,
        Category::Opportunities,
        Category::Events,
        Category::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Notes => "Notes",
            Category::Doubts => "Doubts",
            Category::Opportunities => "Opportunities",
            Category::Events => "Events",
            Category::Projects => "Projects",
            Category::General => "General",
        }
    }

    pub fn is_taggable(&self) -> bool {
        Self::TAGGABLE.contains(self)
    }

    /// Parse a model-produced label against the taggable set. Tolerates
    /// surrounding whitespace, quotes, a trailing period and letter case.
    pub fn from_model_label(raw: &str) -> Option<Category> {
        let label = raw
            .trim()
            .trim_matches(|c| c == '"' || c == '\'' || c == '`')
            .trim_end_matches('.')
            .trim();
        Self::TAGGABLE
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(label))
    }

    fn prompt_list() -> String {
        Self::TAGGABLE
            .iter()
            .map(Category::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn category_prompt(req: &AnalysisRequest) -> String {
    format!(
        "Categorize this post into ONE of these: {}. Reply with only the category name:\n\nTitle: {}\nContent: {}",
        Category::prompt_list(),
        req.title,
        req.body
    )
}

pub struct AutoCategorizer {
    rules: Arc<ContentRules>,
    ai: AiCapability,
}

impl AutoCategorizer {
    pub fn new(rules: Arc<ContentRules>, ai: AiCapability) -> Self {
        Self { rules, ai }
    }

    /// Never fails and never returns a category outside [`Category::TAGGABLE`].
    pub async fn categorize(&self, req: &AnalysisRequest) -> Category {
        if let Some(hit) = self.rules.match_category(&req.joined()) {
            debug!(target: "category", category = %hit, "keyword rule matched");
            return hit;
        }

        let Some(generator) = self.ai.generator() else {
            return Category::General;
        };

        match generator.generate(&category_prompt(req)).await {
            Ok(label) => Category::from_model_label(&label).unwrap_or_else(|| {
                debug!(target: "category", "model label outside category set; using General");
                Category::General
            }),
            Err(e) => {
                warn!(target: "category", error = %e, "AI categorization failed; using General");
                Category::General
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_labels_are_validated() {
        assert_eq!(Category::from_model_label(" Events.\n"), Some(Category::Events));
        assert_eq!(Category::from_model_label("\"notes\""), Some(Category::Notes));
        assert_eq!(Category::from_model_label("Projects"), None);
        assert_eq!(Category::from_model_label("Sports"), None);
        assert_eq!(Category::from_model_label(""), None);
        assert_eq!(
            Category::from_model_label("The category is Events"),
            None
        );
    }

    #[test]
    fn projects_is_not_taggable() {
        assert!(!Category::Projects.is_taggable());
        assert!(Category::General.is_taggable());
    }

    #[test]
    fn serde_uses_display_labels() {
        let s = serde_json::to_string(&Category::Opportunities).unwrap();
        assert_eq!(s, "\"Opportunities\"");
    }
}
