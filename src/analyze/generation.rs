//! Generation client: one prompt in, the model's first candidate text out.
//!
//! Owns retry-with-backoff for rate limits and error classification. Prompt
//! composition belongs to the callers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ai::AiConfig;
use crate::error::GenerationError;
use crate::telemetry::{emit_best_effort, SharedTelemetry, TelemetryEvent};

/// The seam every evaluator depends on.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Send a fully composed prompt and return the trimmed response text.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

pub type SharedGenerator = Arc<dyn TextGenerator>;

/// Whether AI-backed behaviour is available. Decided once at startup and
/// injected into each evaluator.
#[derive(Clone)]
pub enum AiCapability {
    Enabled(SharedGenerator),
    Disabled,
}

impl AiCapability {
    pub fn generator(&self) -> Option<&SharedGenerator> {
        match self {
            AiCapability::Enabled(g) => Some(g),
            AiCapability::Disabled => None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, AiCapability::Enabled(_))
    }
}

impl std::fmt::Debug for AiCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiCapability::Enabled(g) => write!(f, "AiCapability::Enabled({})", g.name()),
            AiCapability::Disabled => f.write_str("AiCapability::Disabled"),
        }
    }
}

/// Retry budget counts total attempts. After a rate limit on attempt `n`
/// (0-based) the client sleeps `base_delay * 2^n` if another attempt remains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Gemini `generateContent` REST client.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    retry: RetryPolicy,
    telemetry: SharedTelemetry,
}

impl GeminiClient {
    pub fn new(cfg: &AiConfig, telemetry: SharedTelemetry) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("campus-connect/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            retry: cfg.retry_policy(),
            telemetry,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// Like [`TextGenerator::generate`] with an explicit attempt budget.
    pub async fn generate_with_budget(
        &self,
        prompt: &str,
        max_attempts: u32,
    ) -> Result<String, GenerationError> {
        // Local, fast failure: no telemetry round, no network.
        let Some(key) = self.api_key.as_deref() else {
            return Err(GenerationError::Configuration);
        };
        let max_attempts = max_attempts.max(1);

        emit_best_effort(
            self.telemetry.as_ref(),
            TelemetryEvent::RequestStart {
                model: self.model.clone(),
                prompt_chars: prompt.chars().count(),
            },
        );
        let started = Instant::now();

        let mut attempt: u32 = 0;
        let outcome = loop {
            match self.attempt_once(key, prompt).await {
                Err(GenerationError::RateLimited { .. }) if attempt + 1 < max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        target: "generation",
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "rate limited; backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(GenerationError::RateLimited { .. }) => {
                    break Err(GenerationError::RateLimited {
                        attempts: attempt + 1,
                    });
                }
                other => break other,
            }
        };

        let attempts = attempt + 1;
        match &outcome {
            Ok(text) => emit_best_effort(
                self.telemetry.as_ref(),
                TelemetryEvent::RequestSuccess {
                    model: self.model.clone(),
                    latency_ms: started.elapsed().as_millis() as u64,
                    response_chars: text.chars().count(),
                    attempts,
                },
            ),
            Err(e) => emit_best_effort(
                self.telemetry.as_ref(),
                TelemetryEvent::RequestError {
                    model: self.model.clone(),
                    kind: e.kind(),
                    message: e.to_string(),
                    attempts,
                },
            ),
        }
        outcome
    }

    async fn attempt_once(&self, key: &str, prompt: &str) -> Result<String, GenerationError> {
        #[derive(Serialize)]
        struct PartReq<'a> {
            text: &'a str,
        }
        #[derive(Serialize)]
        struct ContentReq<'a> {
            parts: Vec<PartReq<'a>>,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            contents: Vec<ContentReq<'a>>,
        }
        #[derive(Deserialize)]
        struct Resp {
            #[serde(default)]
            candidates: Vec<Candidate>,
        }
        #[derive(Deserialize)]
        struct Candidate {
            content: Option<CandidateContent>,
        }
        #[derive(Deserialize)]
        struct CandidateContent {
            #[serde(default)]
            parts: Vec<PartResp>,
        }
        #[derive(Deserialize)]
        struct PartResp {
            text: Option<String>,
        }

        let req = Req {
            contents: vec![ContentReq {
                parts: vec![PartReq { text: prompt }],
            }],
        };

        let resp = self
            .http
            .post(self.endpoint())
            .query(&[("key", key)])
            .json(&req)
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GenerationError::RateLimited { attempts: 1 });
        }
        if !status.is_success() {
            debug!(target: "generation", status = status.as_u16(), "non-success response");
            return Err(GenerationError::Service {
                status: status.as_u16(),
            });
        }

        let body: Resp = resp
            .json()
            .await
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;
        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .map(|t| t.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(GenerationError::MalformedResponse(
                "no candidate text".to_string(),
            ));
        }
        Ok(text)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.generate_with_budget(prompt, self.retry.max_attempts)
            .await
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}
