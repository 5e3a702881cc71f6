//! Runtime configuration: AI credential/retry settings and content rules.

pub mod ai;
pub mod rules;

pub use ai::{AiConfig, AnalysisMode};
pub use rules::{CategoryRule, ContentRules};
