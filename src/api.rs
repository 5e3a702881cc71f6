use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::analyze::{
    analyze_with_deadline, AiCapability, AnalysisRequest, ContentPipeline, DeadlineOutcome,
};
use crate::assist::{ChatAssistant, Flashcard, FlashcardGenerator, RewriteAction, Rewriter};
use crate::config::{AiConfig, AnalysisMode, ContentRules};
use crate::error::{FlashcardError, GenerationError, StoreError};
use crate::posts::enrich::{EnrichmentHandle, EnrichmentJob, EnrichmentWorker};
use crate::posts::{
    Comment, InMemoryPostStore, LikeState, NewComment, NewPost, Post, SharedPostStore,
};
use crate::telemetry::{SharedTelemetry, TracingTelemetry};

/// Everything needed to assemble the service; tests inject their own parts.
pub struct AppParts {
    pub ai: AiCapability,
    pub rules: Arc<ContentRules>,
    pub mode: AnalysisMode,
    pub store: SharedPostStore,
    pub telemetry: SharedTelemetry,
    pub deadline: Duration,
    pub metrics: Option<PrometheusHandle>,
}

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<ContentPipeline>,
    ai: AiCapability,
    store: SharedPostStore,
    enrich: EnrichmentHandle,
    deadline: Duration,
    metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Spawns the enrichment worker; call inside a Tokio runtime.
    pub fn new(parts: AppParts) -> Self {
        let pipeline = Arc::new(ContentPipeline::new(
            parts.rules,
            parts.ai.clone(),
            parts.mode,
        ));
        let worker = EnrichmentWorker::new(pipeline.clone(), parts.store.clone(), parts.telemetry);
        let (enrich, _join) = worker.spawn();
        Self {
            pipeline,
            ai: parts.ai,
            store: parts.store,
            enrich,
            deadline: parts.deadline,
            metrics: parts.metrics,
        }
    }

    /// Production wiring: env config, rules file, in-memory store, tracing telemetry.
    pub fn from_env() -> anyhow::Result<Self> {
        let cfg = AiConfig::load_default()?;
        let telemetry: SharedTelemetry = Arc::new(TracingTelemetry);
        let ai = cfg.capability(telemetry.clone())?;
        let rules = ContentRules::load_default()?;
        info!(
            ai_enabled = ai.is_enabled(),
            mode = ?cfg.mode,
            model = %cfg.model,
            blocklist = rules.blocklist.len(),
            category_rules = rules.category_rules.len(),
            "content pipeline configured"
        );
        Ok(Self::new(AppParts {
            ai,
            rules: Arc::new(rules),
            mode: cfg.mode,
            store: Arc::new(InMemoryPostStore::new()),
            telemetry,
            deadline: cfg.deadline(),
            metrics: crate::metrics::install_or_warn(),
        }))
    }
}

pub fn router(state: AppState) -> Router {
    let metrics = crate::metrics::router(state.metrics.clone());
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/generate", post(generate))
        .route("/moderate", post(moderate))
        .route("/analyze", post(analyze))
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/{id}", get(get_post).delete(delete_post))
        .route("/posts/{id}/like", post(like_post))
        .route("/posts/{id}/comments", get(list_comments).post(add_comment))
        .route("/chat", post(chat))
        .route("/flashcards", post(flashcards))
        .route("/rewrite", post(rewrite))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
        .merge(metrics)
}

// ---------------- errors ----------------

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Flashcards(#[from] FlashcardError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn generation_status(e: &GenerationError) -> StatusCode {
    match e {
        GenerationError::Configuration => StatusCode::SERVICE_UNAVAILABLE,
        GenerationError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        GenerationError::Service { .. }
        | GenerationError::Network(_)
        | GenerationError::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Generation(e) => generation_status(e),
            ApiError::Flashcards(FlashcardError::Generation(e)) => generation_status(e),
            ApiError::Flashcards(FlashcardError::EmptyInput) => StatusCode::BAD_REQUEST,
            ApiError::Flashcards(FlashcardError::Unparsable) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::SelfLike) => StatusCode::CONFLICT,
            ApiError::Store(StoreError::NotAuthor) => StatusCode::FORBIDDEN,
            ApiError::Store(StoreError::Backend(e)) => {
                error!(error = %e, "post store error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let message = match &self {
            ApiError::Generation(GenerationError::Configuration)
            | ApiError::Flashcards(FlashcardError::Generation(GenerationError::Configuration)) => {
                "Server configuration error".to_string()
            }
            ApiError::Store(StoreError::Backend(_)) => "internal error".to_string(),
            other => other.to_string(),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

fn require_text(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }
    Ok(())
}

// ---------------- handlers ----------------

#[derive(Deserialize)]
struct GenerateReq {
    #[serde(default)]
    prompt: String,
}

#[derive(Serialize)]
struct TextResp {
    text: String,
}

/// Thin proxy so browser clients never hold the credential.
async fn generate(
    State(state): State<AppState>,
    Json(body): Json<GenerateReq>,
) -> Result<Json<TextResp>, ApiError> {
    require_text("prompt", &body.prompt)?;
    let generator = state.ai.generator().ok_or(GenerationError::Configuration)?;
    let text = generator.generate(&body.prompt).await?;
    Ok(Json(TextResp { text }))
}

#[derive(Deserialize)]
struct ModerateReq {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

#[derive(Serialize)]
struct ModerateResp {
    flagged: bool,
}

/// Blocklist-only check; never calls the model.
async fn moderate(State(state): State<AppState>, Json(body): Json<ModerateReq>) -> Json<ModerateResp> {
    let text = format!("{} {}", body.title, body.content);
    let verdict = state.pipeline.moderation().keyword_verdict(&text);
    Json(ModerateResp {
        flagged: verdict.flagged,
    })
}

async fn analyze(
    State(state): State<AppState>,
    Json(body): Json<AnalysisRequest>,
) -> Json<DeadlineOutcome> {
    Json(analyze_with_deadline(state.pipeline.clone(), body, state.deadline).await)
}

async fn create_post(
    State(state): State<AppState>,
    Json(body): Json<NewPost>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    require_text("title", &body.title)?;
    require_text("content", &body.content)?;

    let post = state.store.create(body).await?;
    state.enrich.submit(EnrichmentJob {
        post_id: post.id,
        title: post.title.clone(),
        body: post.content.clone(),
        chosen_category: post.category,
    });
    Ok((StatusCode::CREATED, Json(post)))
}

async fn list_posts(State(state): State<AppState>) -> Result<Json<Vec<Post>>, ApiError> {
    Ok(Json(state.store.list().await?))
}

async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Post>, ApiError> {
    state.store.get(id).await?.map(Json).ok_or(ApiError::NotFound)
}

#[derive(Deserialize)]
struct UserReq {
    #[serde(default)]
    user: String,
}

/// Toggles the caller's like; the author gets 409.
async fn like_post(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(body): Json<UserReq>,
) -> Result<Json<LikeState>, ApiError> {
    require_text("user", &body.user)?;
    Ok(Json(state.store.like(id, body.user.trim()).await?))
}

/// `DELETE /posts/{id}?user=...`; only the author may delete.
async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Query(params): Query<UserReq>,
) -> Result<StatusCode, ApiError> {
    require_text("user", &params.user)?;
    state.store.delete(id, params.user.trim()).await?;
    info!(post_id = id, "post deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    Ok(Json(state.store.list_comments(id).await?))
}

async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(body): Json<NewComment>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    require_text("content", &body.content)?;
    let comment = state.store.add_comment(id, body).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[derive(Deserialize)]
struct ChatReq {
    #[serde(default)]
    message: String,
}

#[derive(Serialize)]
struct ChatResp {
    reply: String,
}

async fn chat(State(state): State<AppState>, Json(body): Json<ChatReq>) -> Result<Json<ChatResp>, ApiError> {
    require_text("message", &body.message)?;
    let reply = ChatAssistant::new(state.ai.clone()).ask(&body.message).await?;
    Ok(Json(ChatResp { reply }))
}

#[derive(Deserialize)]
struct FlashcardsReq {
    #[serde(default)]
    content: String,
}

#[derive(Serialize)]
struct FlashcardsResp {
    cards: Vec<Flashcard>,
}

async fn flashcards(
    State(state): State<AppState>,
    Json(body): Json<FlashcardsReq>,
) -> Result<Json<FlashcardsResp>, ApiError> {
    let cards = FlashcardGenerator::new(state.ai.clone())
        .generate(&body.content)
        .await?;
    Ok(Json(FlashcardsResp { cards }))
}

#[derive(Deserialize)]
struct RewriteReq {
    #[serde(default)]
    action: RewriteAction,
    #[serde(default)]
    text: String,
}

async fn rewrite(
    State(state): State<AppState>,
    Json(body): Json<RewriteReq>,
) -> Result<Json<TextResp>, ApiError> {
    require_text("text", &body.text)?;
    let text = Rewriter::new(state.ai.clone())
        .rewrite(body.action, &body.text)
        .await?;
    Ok(Json(TextResp { text }))
}
