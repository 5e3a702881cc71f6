//! Error taxonomy for the content pipeline.
//!
//! Only the generation client raises; every evaluator resolves these to its
//! own documented default before returning.

use thiserror::Error;

/// Failures of a single prompt/response exchange with the remote model.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// No credential configured. Detected locally, never retried.
    #[error("generation service is not configured (missing API key)")]
    Configuration,

    /// Every attempt in the budget was answered with a rate-limit signal.
    #[error("rate limited by generation service after {attempts} attempt(s)")]
    RateLimited { attempts: u32 },

    /// Non-success, non-rate-limit status. Not retried.
    #[error("generation service returned HTTP {status}")]
    Service { status: u16 },

    /// Transport failure (connect, timeout, TLS).
    #[error("network error talking to generation service: {0}")]
    Network(String),

    /// 2xx response without a usable candidate text.
    #[error("malformed response from generation service: {0}")]
    MalformedResponse(String),
}

impl GenerationError {
    /// Short stable label for logs/metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::Configuration => "configuration",
            GenerationError::RateLimited { .. } => "rate_limited",
            GenerationError::Service { .. } => "service",
            GenerationError::Network(_) => "network",
            GenerationError::MalformedResponse(_) => "malformed_response",
        }
    }
}

/// Why a composite payload could not be used.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompositeParseError {
    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("response is not a JSON object")]
    NotAnObject,

    #[error("missing key `{0}`")]
    MissingKey(&'static str),

    #[error("key `{key}` has the wrong type (expected {expected})")]
    WrongType {
        key: &'static str,
        expected: &'static str,
    },

    #[error("unknown category label `{0}`")]
    UnknownCategory(String),
}

/// Flashcard generation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlashcardError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("could not find any flashcards in the model response")]
    Unparsable,

    #[error("no content to build flashcards from")]
    EmptyInput,
}

/// A telemetry sink refused or failed to record an event.
#[derive(Debug, Error)]
#[error("telemetry sink failed: {0}")]
pub struct TelemetryError(pub String);

/// Failures of the post store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("post {0} not found")]
    NotFound(u64),
    #[error("authors cannot like their own post")]
    SelfLike,
    #[error("only the author can delete this post")]
    NotAuthor,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}
