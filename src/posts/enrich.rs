//! Fire-and-forget background enrichment of freshly created posts.
//!
//! The creation flow hands a job to [`EnrichmentHandle::submit`] and moves on.
//! The worker runs each job on its own task, applies the resulting update to
//! the store at most once, and swallows every failure after logging it.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{PostUpdate, SharedPostStore};
use crate::analyze::{AnalysisRequest, Category, ContentPipeline};
use crate::telemetry::{emit_best_effort, SharedTelemetry, TelemetryEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentJob {
    pub post_id: u64,
    pub title: String,
    pub body: String,
    /// Category the author picked at creation time.
    pub chosen_category: Category,
}

/// Reported after each job, for observers that want to know when the
/// background work has settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentOutcome {
    pub post_id: u64,
    pub update: PostUpdate,
    /// False when the update was empty or the store rejected it.
    pub applied: bool,
}

#[derive(Clone)]
pub struct EnrichmentHandle {
    tx: mpsc::UnboundedSender<EnrichmentJob>,
}

impl EnrichmentHandle {
    /// Never fails the caller. A stopped worker only costs a log line.
    pub fn submit(&self, job: EnrichmentJob) {
        let post_id = job.post_id;
        if self.tx.send(job).is_err() {
            warn!(target: "enrich", post_id, "enrichment worker is gone; job dropped");
        }
    }
}

#[derive(Clone)]
pub struct EnrichmentWorker {
    pipeline: Arc<ContentPipeline>,
    store: SharedPostStore,
    telemetry: SharedTelemetry,
    outcomes: Option<mpsc::UnboundedSender<EnrichmentOutcome>>,
}

impl EnrichmentWorker {
    pub fn new(
        pipeline: Arc<ContentPipeline>,
        store: SharedPostStore,
        telemetry: SharedTelemetry,
    ) -> Self {
        Self {
            pipeline,
            store,
            telemetry,
            outcomes: None,
        }
    }

    pub fn with_outcome_sink(mut self, tx: mpsc::UnboundedSender<EnrichmentOutcome>) -> Self {
        self.outcomes = Some(tx);
        self
    }

    /// Start the receive loop. Must be called inside a Tokio runtime.
    pub fn spawn(self) -> (EnrichmentHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let join = tokio::spawn(self.run(rx));
        (EnrichmentHandle { tx }, join)
    }

    async fn run(self, mut rx: mpsc::UnboundedReceiver<EnrichmentJob>) {
        while let Some(job) = rx.recv().await {
            let worker = self.clone();
            // Detached: no cancellation, no join.
            tokio::spawn(async move {
                worker.process(job).await;
            });
        }
        debug!(target: "enrich", "job channel closed; worker exiting");
    }

    /// Analyze one post and write the result back. Returns the outcome; never errors.
    pub async fn process(&self, job: EnrichmentJob) -> EnrichmentOutcome {
        let post_id = job.post_id;
        let req = AnalysisRequest::new(job.title, job.body);
        let analysis = self.pipeline.analyze(&req).await;

        if analysis.flagged {
            emit_best_effort(
                self.telemetry.as_ref(),
                TelemetryEvent::Flagged {
                    post_id,
                    reason: analysis.reason.clone().unwrap_or_default(),
                },
            );
        }

        let update = PostUpdate::from_analysis(&analysis, job.chosen_category);
        let applied = if update.is_empty() {
            debug!(target: "enrich", post_id, "nothing to update");
            false
        } else {
            match self.store.update(post_id, update.clone()).await {
                Ok(()) => {
                    info!(
                        target: "enrich",
                        post_id,
                        flagged = ?update.flagged,
                        has_summary = update.summary.is_some(),
                        category = ?update.category,
                        "applied AI updates to post"
                    );
                    true
                }
                Err(e) => {
                    warn!(target: "enrich", post_id, error = %e, "background AI update failed");
                    false
                }
            }
        };

        let outcome = EnrichmentOutcome {
            post_id,
            update,
            applied,
        };
        if let Some(tx) = &self.outcomes {
            let _ = tx.send(outcome.clone());
        }
        outcome
    }
}
