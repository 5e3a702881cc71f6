//! Flashcard generation and a lenient parser for the model's reply.
//!
//! Accepted line formats:
//! - `Q: question | A: answer`
//! - `1. question` followed by an answer line (`- answer` or `Answer: answer`)

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::run_prompt;
use crate::analyze::generation::AiCapability;
use crate::error::FlashcardError;

pub const FLASHCARD_COUNT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
}

pub fn flashcard_prompt(content: &str) -> String {
    format!(
        "Create exactly {FLASHCARD_COUNT} flashcards from this content. Format STRICTLY as:\n\
         Q: [question here] | A: [answer here]\n\n\
         Example:\n\
         Q: What is Rust? | A: A systems programming language focused on safety and speed\n\n\
         Now create {FLASHCARD_COUNT} flashcards from this content:\n\n{content}"
    )
}

fn re(cell: &'static OnceCell<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("flashcard regex"))
}

fn q_label() -> &'static Regex {
    static CELL: OnceCell<Regex> = OnceCell::new();
    re(&CELL, r"(?i)^\s*(question|q)\s*:")
}

fn a_label() -> &'static Regex {
    static CELL: OnceCell<Regex> = OnceCell::new();
    re(&CELL, r"(?i)^\s*(answer|a)\s*:")
}

fn numbered() -> &'static Regex {
    static CELL: OnceCell<Regex> = OnceCell::new();
    re(&CELL, r"^\s*\d+\.")
}

fn answer_prefix() -> &'static Regex {
    static CELL: OnceCell<Regex> = OnceCell::new();
    re(&CELL, r"(?i)^\s*(-|answer:)")
}

pub fn parse_flashcards(raw: &str) -> Vec<Flashcard> {
    let lines: Vec<&str> = raw.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let mut cards = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if line.contains("Q:") && line.contains("A:") {
            let mut parts = line.split('|');
            if let (Some(q), Some(a)) = (parts.next(), parts.next()) {
                let question = q_label().replace(q, "").trim().to_string();
                let answer = a_label().replace(a, "").trim().to_string();
                if !question.is_empty() && !answer.is_empty() {
                    cards.push(Flashcard { question, answer });
                }
            }
        } else if numbered().is_match(line) {
            let question = numbered().replace(line, "").trim().to_string();
            let Some(next) = lines.get(i + 1) else {
                continue;
            };
            if numbered().is_match(next) {
                continue;
            }
            let answer = answer_prefix().replace(next, "").trim().to_string();
            if !question.is_empty() && !answer.is_empty() {
                cards.push(Flashcard { question, answer });
            }
        }
    }
    cards
}

pub struct FlashcardGenerator {
    ai: AiCapability,
}

impl FlashcardGenerator {
    pub fn new(ai: AiCapability) -> Self {
        Self { ai }
    }

    pub async fn generate(&self, content: &str) -> Result<Vec<Flashcard>, FlashcardError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(FlashcardError::EmptyInput);
        }
        let raw = run_prompt(&self.ai, &flashcard_prompt(content)).await?;
        let cards = parse_flashcards(&raw);
        if cards.is_empty() {
            debug!(target: "assist", chars = raw.chars().count(), "unexpected flashcard format");
            return Err(FlashcardError::Unparsable);
        }
        Ok(cards)
    }
}
