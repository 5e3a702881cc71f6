use axum::{http::StatusCode, routing::get, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::warn;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the process-wide Prometheus recorder once; later calls return the
/// same handle.
pub fn install() -> anyhow::Result<PrometheusHandle> {
    HANDLE
        .get_or_try_init(|| {
            // Use default buckets to avoid API differences across crate versions.
            PrometheusBuilder::new()
                .install_recorder()
                .map_err(anyhow::Error::from)
        })
        .cloned()
}

/// Like [`install`], but a failure is logged and leaves `/metrics` answering 503.
pub fn install_or_warn() -> Option<PrometheusHandle> {
    keep_or_warn(install())
}

fn keep_or_warn(res: anyhow::Result<PrometheusHandle>) -> Option<PrometheusHandle> {
    match res {
        Ok(h) => Some(h),
        Err(e) => {
            warn!(target: "metrics", error = %e, "prometheus recorder not installed; /metrics disabled");
            None
        }
    }
}

/// Returns a router exposing `/metrics` with the Prometheus exposition format.
pub fn router(handle: Option<PrometheusHandle>) -> Router {
    Router::new().route(
        "/metrics",
        get(move || {
            let h = handle.clone();
            async move {
                match h {
                    Some(h) => (StatusCode::OK, h.render()),
                    None => (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "metrics recorder not installed".to_string(),
                    ),
                }
            }
        }),
    )
}
