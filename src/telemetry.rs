//! Telemetry collaborator: named events with a free-form attribute map.
//!
//! Emission is best-effort. A sink may fail, but callers go through
//! [`emit_best_effort`], which logs and drops the failure.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::TelemetryError;

#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    RequestStart {
        model: String,
        prompt_chars: usize,
    },
    RequestSuccess {
        model: String,
        latency_ms: u64,
        response_chars: usize,
        attempts: u32,
    },
    RequestError {
        model: String,
        kind: &'static str,
        message: String,
        attempts: u32,
    },
    Flagged {
        post_id: u64,
        reason: String,
    },
}

impl TelemetryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TelemetryEvent::RequestStart { .. } => "ai.request.start",
            TelemetryEvent::RequestSuccess { .. } => "ai.request.success",
            TelemetryEvent::RequestError { .. } => "ai.request.error",
            TelemetryEvent::Flagged { .. } => "post.flagged",
        }
    }

    pub fn attributes(&self) -> BTreeMap<&'static str, Value> {
        let mut m = BTreeMap::new();
        match self {
            TelemetryEvent::RequestStart {
                model,
                prompt_chars,
            } => {
                m.insert("model", json!(model));
                m.insert("prompt_chars", json!(prompt_chars));
            }
            TelemetryEvent::RequestSuccess {
                model,
                latency_ms,
                response_chars,
                attempts,
            } => {
                m.insert("model", json!(model));
                m.insert("latency_ms", json!(latency_ms));
                m.insert("response_chars", json!(response_chars));
                m.insert("attempts", json!(attempts));
            }
            TelemetryEvent::RequestError {
                model,
                kind,
                message,
                attempts,
            } => {
                m.insert("model", json!(model));
                m.insert("kind", json!(kind));
                m.insert("message", json!(message));
                m.insert("attempts", json!(attempts));
            }
            TelemetryEvent::Flagged { post_id, reason } => {
                m.insert("post_id", json!(post_id));
                m.insert("reason", json!(reason));
            }
        }
        m
    }
}

pub trait Telemetry: Send + Sync {
    fn emit(&self, event: &TelemetryEvent) -> Result<(), TelemetryError>;
}

pub type SharedTelemetry = Arc<dyn Telemetry>;

/// Emit and swallow any sink failure.
pub fn emit_best_effort(sink: &dyn Telemetry, event: TelemetryEvent) {
    if let Err(e) = sink.emit(&event) {
        debug!(target: "telemetry", event = event.name(), error = %e, "telemetry emit dropped");
    }
}

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ai_requests_total", "Generation requests started.");
        describe_counter!(
            "ai_request_success_total",
            "Generation requests that returned text."
        );
        describe_counter!(
            "ai_request_errors_total",
            "Generation requests that failed, by error kind."
        );
        describe_histogram!(
            "ai_request_latency_ms",
            "Generation latency in milliseconds, retries included."
        );
        describe_counter!("posts_flagged_total", "Posts flagged by the pipeline.");
    });
}

/// Default sink: structured log line + Prometheus series.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn emit(&self, event: &TelemetryEvent) -> Result<(), TelemetryError> {
        ensure_metrics_described();
        let attrs = event.attributes();
        match event {
            TelemetryEvent::RequestStart { .. } => {
                counter!("ai_requests_total").increment(1);
                debug!(target: "telemetry", event = event.name(), attrs = ?attrs);
            }
            TelemetryEvent::RequestSuccess { latency_ms, .. } => {
                counter!("ai_request_success_total").increment(1);
                histogram!("ai_request_latency_ms").record(*latency_ms as f64);
                info!(target: "telemetry", event = event.name(), attrs = ?attrs);
            }
            TelemetryEvent::RequestError { kind, .. } => {
                counter!("ai_request_errors_total", "kind" => *kind).increment(1);
                warn!(target: "telemetry", event = event.name(), attrs = ?attrs);
            }
            TelemetryEvent::Flagged { .. } => {
                counter!("posts_flagged_total").increment(1);
                info!(target: "telemetry", event = event.name(), attrs = ?attrs);
            }
        }
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn emit(&self, _event: &TelemetryEvent) -> Result<(), TelemetryError> {
        Ok(())
    }
}

/// Keeps events in memory; handy for tests and local inspection.
#[derive(Debug, Default)]
pub struct MemoryTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
    fail: bool,
}

impl MemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records events but reports every emit as failed.
    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(TelemetryEvent::name).collect()
    }
}

impl Telemetry for MemoryTelemetry {
    fn emit(&self, event: &TelemetryEvent) -> Result<(), TelemetryError> {
        if let Ok(mut g) = self.events.lock() {
            g.push(event.clone());
        }
        if self.fail {
            return Err(TelemetryError("sink unavailable".to_string()));
        }
        Ok(())
    }
}
