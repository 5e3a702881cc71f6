//! Keyword rules for the non-AI paths (hot path and fallback).
//!
//! TOML schema:
//! - `blocklist`:      substrings that flag a post
//! - `category_rules`: ordered `{ category, terms }`; first match wins
//!
//! Terms are lowercased on load; matching lowercases the input text.

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::analyze::category::Category;

pub const DEFAULT_RULES_CONFIG_PATH: &str = "config/rules.toml";
pub const ENV_RULES_CONFIG_PATH: &str = "RULES_CONFIG_PATH";

const DEFAULT_BLOCKLIST: [&str; 7] = [
    "spam",
    "scam",
    "fake",
    "badword",
    "misinformation",
    "hate",
    "abuse",
];

static DEFAULT_RULES: Lazy<ContentRules> = Lazy::new(|| ContentRules {
    blocklist: DEFAULT_BLOCKLIST.iter().map(|s| s.to_string()).collect(),
    category_rules: vec![
        CategoryRule::new(Category::Notes, &["note", "study", "exam"]),
        CategoryRule::new(Category::Doubts, &["doubt", "help", "question"]),
        CategoryRule::new(
            Category::Opportunities,
            &["job", "internship", "opportunity"],
        ),
        CategoryRule::new(Category::Events, &["event", "workshop", "seminar"]),
    ],
});

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CategoryRule {
    pub category: Category,
    pub terms: Vec<String>,
}

impl CategoryRule {
    pub fn new(category: Category, terms: &[&str]) -> Self {
        Self {
            category,
            terms: terms.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// `text` must already be lowercased.
    pub fn matches(&self, text: &str) -> bool {
        self.terms.iter().any(|t| text.contains(t.as_str()))
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ContentRules {
    #[serde(default)]
    pub blocklist: Vec<String>,
    #[serde(default)]
    pub category_rules: Vec<CategoryRule>,
}

impl Default for ContentRules {
    fn default() -> Self {
        DEFAULT_RULES.clone()
    }
}

impl ContentRules {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading content rules from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut rules: ContentRules = toml::from_str(s).context("parsing content rules")?;
        for rule in &rules.category_rules {
            if !rule.category.is_taggable() {
                return Err(anyhow!(
                    "category rule targets `{}`, which is not an auto-tag category",
                    rule.category
                ));
            }
        }
        rules.normalize();
        Ok(rules)
    }

    /// Load using env var + fallbacks:
    /// 1) $RULES_CONFIG_PATH
    /// 2) config/rules.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_RULES_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from_file(&pb);
            }
            return Err(anyhow!("RULES_CONFIG_PATH points to non-existent path"));
        }
        let p = PathBuf::from(DEFAULT_RULES_CONFIG_PATH);
        if p.exists() {
            return Self::load_from_file(&p);
        }
        Ok(Self::default())
    }

    /// Case-insensitive substring containment against the blocklist.
    pub fn blocklist_hit(&self, text: &str) -> Option<&str> {
        let lower = text.to_lowercase();
        self.blocklist
            .iter()
            .find(|w| lower.contains(w.as_str()))
            .map(String::as_str)
    }

    /// First matching category rule, if any.
    pub fn match_category(&self, text: &str) -> Option<Category> {
        let lower = text.to_lowercase();
        self.category_rules
            .iter()
            .find(|r| r.matches(&lower))
            .map(|r| r.category)
    }

    fn normalize(&mut self) {
        self.blocklist = clean_terms(std::mem::take(&mut self.blocklist));
        for rule in &mut self.category_rules {
            rule.terms = clean_terms(std::mem::take(&mut rule.terms));
        }
    }
}

fn clean_terms(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for t in items {
        let t = t.trim().to_lowercase();
        if !t.is_empty() && !out.contains(&t) {
            out.push(t);
        }
    }
    out
}
