// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use crate::analyze::generation::{AiCapability, GeminiClient, RetryPolicy};
use crate::telemetry::SharedTelemetry;

pub const ENV_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_MODEL: &str = "GEMINI_MODEL";
pub const ENV_BASE_URL: &str = "GEMINI_BASE_URL";
pub const ENV_MAX_ATTEMPTS: &str = "AI_MAX_ATTEMPTS";
pub const ENV_BACKOFF_BASE_MS: &str = "AI_BACKOFF_BASE_MS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "AI_REQUEST_TIMEOUT_SECS";
pub const ENV_DEADLINE_MS: &str = "AI_DEADLINE_MS";
pub const ENV_ANALYSIS_MODE: &str = "ANALYSIS_MODE";
pub const ENV_AI_CONFIG_PATH: &str = "AI_CONFIG_PATH";
pub const DEFAULT_AI_CONFIG_PATH: &str = "config/ai.json";

/// Value shipped in `.env.example`; treated exactly like a missing key.
pub const PLACEHOLDER_API_KEY: &str = "your_gemini_api_key_here";

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    1_000
}
fn default_request_timeout_secs() -> u64 {
    20
}
fn default_deadline_ms() -> u64 {
    8_000
}

/// Which analysis path the post-creation flow uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Moderation, summary and category as three independent evaluators.
    #[default]
    Separate,
    /// One structured call returning all three signals.
    Composite,
}

impl AnalysisMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "separate" => Some(AnalysisMode::Separate),
            "composite" => Some(AnalysisMode::Composite),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// `None` means fallback-only operation. "ENV" in a config file means:
    /// read from GEMINI_API_KEY.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Total attempts per generation call (not retries after the first).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Wall-clock race used by interactive callers before showing "busy".
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
    #[serde(default)]
    pub mode: AnalysisMode,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            deadline_ms: default_deadline_ms(),
            mode: AnalysisMode::default(),
        }
    }
}

impl AiConfig {
    /// Build from process environment. Unparsable numbers fall back to defaults.
    pub fn from_env() -> Self {
        let mut cfg = AiConfig::default();
        cfg.apply_env();
        cfg
    }

    /// File first, then environment overrides on top:
    /// 1) $AI_CONFIG_PATH
    /// 2) config/ai.json
    /// 3) built-in defaults
    pub fn load_default() -> anyhow::Result<Self> {
        let mut cfg = if let Ok(p) = env::var(ENV_AI_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                anyhow::bail!("AI_CONFIG_PATH points to non-existent path");
            }
            Self::load_from_file(&pb)?
        } else if Path::new(DEFAULT_AI_CONFIG_PATH).exists() {
            Self::load_from_file(DEFAULT_AI_CONFIG_PATH)?
        } else {
            AiConfig::default()
        };
        cfg.apply_env();
        Ok(cfg)
    }

    /// Set variables win over whatever is already in `self`.
    fn apply_env(&mut self) {
        if let Some(key) = normalize_key(env::var(ENV_API_KEY).ok()) {
            self.api_key = Some(key);
        }
        if let Ok(m) = env::var(ENV_MODEL) {
            if !m.trim().is_empty() {
                self.model = m.trim().to_string();
            }
        }
        if let Ok(u) = env::var(ENV_BASE_URL) {
            if !u.trim().is_empty() {
                self.base_url = u.trim().trim_end_matches('/').to_string();
            }
        }
        if let Some(n) = parse_env::<u32>(ENV_MAX_ATTEMPTS) {
            self.max_attempts = n;
        }
        if let Some(n) = parse_env::<u64>(ENV_BACKOFF_BASE_MS) {
            self.backoff_base_ms = n;
        }
        if let Some(n) = parse_env::<u64>(ENV_REQUEST_TIMEOUT_SECS) {
            self.request_timeout_secs = n;
        }
        if let Some(n) = parse_env::<u64>(ENV_DEADLINE_MS) {
            self.deadline_ms = n;
        }
        if let Some(mode) = env::var(ENV_ANALYSIS_MODE)
            .ok()
            .and_then(|m| AnalysisMode::parse(&m))
        {
            self.mode = mode;
        }
        self.sanitize();
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let mut cfg: AiConfig = serde_json::from_str(&data)?;

        // Resolve api key if "ENV"
        let resolved = match cfg.api_key.as_deref().map(str::trim) {
            Some(k) if k.eq_ignore_ascii_case("env") => env::var(ENV_API_KEY).ok(),
            _ => cfg.api_key.take(),
        };
        cfg.api_key = normalize_key(resolved);
        cfg.base_url = cfg.base_url.trim_end_matches('/').to_string();
        cfg.sanitize();

        Ok(cfg)
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.backoff_base_ms),
        }
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    /// The capability flag handed to every evaluator at construction time.
    pub fn capability(&self, telemetry: SharedTelemetry) -> anyhow::Result<AiCapability> {
        if !self.has_credential() {
            return Ok(AiCapability::Disabled);
        }
        let client = GeminiClient::new(self, telemetry)?;
        Ok(AiCapability::Enabled(Arc::new(client)))
    }

    fn sanitize(&mut self) {
        if self.max_attempts == 0 {
            self.max_attempts = 1;
        }
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = default_request_timeout_secs();
        }
    }
}

/// Empty, whitespace-only and placeholder keys count as "no credential".
fn normalize_key(raw: Option<String>) -> Option<String> {
    let key = raw?.trim().to_string();
    if key.is_empty() || key == PLACEHOLDER_API_KEY {
        None
    } else {
        Some(key)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse::<T>().ok())
}
