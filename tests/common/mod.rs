// tests/common/mod.rs
// Shared helpers: a scripted in-process generator standing in for the model.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use campus_connect::analyze::{AiCapability, TextGenerator};
use campus_connect::GenerationError;

/// Body long enough (>= 200 chars) to trigger the summarizer, with no
/// blocklist or category keywords in it.
pub const LONG_BODY: &str = "I rewrote my lecture summaries for the midterm into a single outline. \
It covers sorting algorithms, big O analysis, linked lists, hash tables and a few practice problems \
from last year. Feel free to copy it before Friday.";

/// Replies are served in order; once exhausted, `fallback` is repeated.
pub struct StubGenerator {
    script: Mutex<VecDeque<Result<String, GenerationError>>>,
    fallback: Result<String, GenerationError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl StubGenerator {
    pub fn always(reply: &str) -> Arc<Self> {
        Arc::new(Self::build(Vec::new(), Ok(reply.to_string()), None))
    }

    pub fn failing(err: GenerationError) -> Arc<Self> {
        Arc::new(Self::build(Vec::new(), Err(err), None))
    }

    pub fn scripted(
        script: Vec<Result<String, GenerationError>>,
        fallback: Result<String, GenerationError>,
    ) -> Arc<Self> {
        Arc::new(Self::build(script, fallback, None))
    }

    pub fn slow(reply: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self::build(Vec::new(), Ok(reply.to_string()), Some(delay)))
    }

    fn build(
        script: Vec<Result<String, GenerationError>>,
        fallback: Result<String, GenerationError>,
        delay: Option<Duration>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            delay,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

pub fn enabled(stub: &Arc<StubGenerator>) -> AiCapability {
    AiCapability::Enabled(stub.clone())
}
