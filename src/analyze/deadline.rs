//! Race an analysis against a wall-clock deadline.
//!
//! The analysis runs on its own task. Losing the race does not abort it; the
//! result is simply no longer waited for.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use super::{AnalysisRequest, ContentPipeline, PostAnalysis};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DeadlineOutcome {
    Ready(PostAnalysis),
    /// Placeholder shown when the deadline wins.
    Busy,
}

pub async fn analyze_with_deadline(
    pipeline: Arc<ContentPipeline>,
    req: AnalysisRequest,
    deadline: Duration,
) -> DeadlineOutcome {
    let task = tokio::spawn(async move { pipeline.analyze(&req).await });
    match tokio::time::timeout(deadline, task).await {
        Ok(Ok(analysis)) => DeadlineOutcome::Ready(analysis),
        Ok(Err(join_err)) => {
            warn!(target: "analyze", error = %join_err, "analysis task failed");
            DeadlineOutcome::Busy
        }
        Err(_) => {
            info!(
                target: "analyze",
                deadline_ms = deadline.as_millis() as u64,
                "analysis still running at deadline; returning busy"
            );
            DeadlineOutcome::Busy
        }
    }
}
