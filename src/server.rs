//! HTTP API server.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::answer::answer_question;
use crate::config::Config;
use crate::db;
use crate::embedding::{create_embedding_client, EmbeddingClient};
use crate::error::PipelineError;
use crate::export;
use crate::generative::{create_generative_client, GenerativeClient};
use crate::index::{SqliteVectorIndex, VectorIndex};
use crate::ingest::{ingest_document, IngestReport};
use crate::models::{AnswerRow, DocumentKind};
use crate::ocr::{OcrEngine, TesseractOcr};
use crate::store;
use crate::themes::synthesize_themes;

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pool: SqlitePool,
    index: Arc<dyn VectorIndex>,
    embedder: Option<Arc<dyn EmbeddingClient>>,
    generator: Option<Arc<dyn GenerativeClient>>,
    ocr: Arc<dyn OcrEngine>,
}

/// API error with a stable JSON body: `{"error": {"code", "message"}}`.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        let (status, code) = match &err {
            PipelineError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            PipelineError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            PipelineError::Extraction(_) => (StatusCode::BAD_REQUEST, "extraction_error"),
            PipelineError::Indexing(_) => (StatusCode::BAD_GATEWAY, "indexing_error"),
            PipelineError::Retrieval(_) => (StatusCode::BAD_GATEWAY, "retrieval_error"),
            PipelineError::Synthesis(_) => (StatusCode::BAD_GATEWAY, "synthesis_error"),
            PipelineError::Db(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
        };
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn unavailable(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        code: "provider_disabled",
        message: message.into(),
    }
}

pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let pool = db::connect(&config.db).await?;
    crate::config::ensure_storage_dirs(&config)?;

    let embedder = if config.embedding.is_enabled() {
        Some(create_embedding_client(&config.embedding)?)
    } else {
        None
    };
    let generator = if config.generative.is_enabled() {
        Some(create_generative_client(&config.generative)?)
    } else {
        None
    };

    let state = AppState {
        index: Arc::new(SqliteVectorIndex::new(pool.clone())),
        ocr: Arc::new(TesseractOcr::new(config.ocr.clone())),
        config: Arc::new(config),
        pool,
        embedder,
        generator,
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/documents", post(ingest).get(list_documents))
        .route("/documents/{id}", get(get_document).delete(delete_document))
        .route("/ask", post(ask))
        .route("/themes", post(themes))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state.clone());

    let bind = state.config.server.bind.clone();
    info!(bind = %bind, "starting server");
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Deserialize)]
struct IngestRequest {
    path: String,
    kind: Option<String>,
}

#[derive(Serialize)]
struct IngestResponse {
    doc_id: String,
    filename: String,
    kind: String,
    pages: usize,
    paragraphs: usize,
    chunks: usize,
    indexed: usize,
    pending: usize,
}

impl From<IngestReport> for IngestResponse {
    fn from(r: IngestReport) -> Self {
        Self {
            doc_id: r.doc_id,
            filename: r.filename,
            kind: r.kind.as_str().to_string(),
            pages: r.pages,
            paragraphs: r.paragraphs,
            chunks: r.chunks,
            indexed: r.indexed,
            pending: r.pending,
        }
    }
}

async fn ingest(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, AppError> {
    let override_kind = match req.kind.as_deref() {
        Some(s) => Some(DocumentKind::parse(s).ok_or_else(|| AppError {
            status: StatusCode::BAD_REQUEST,
            code: "invalid_kind",
            message: format!("unknown document kind: {}", s),
        })?),
        None => None,
    };

    let report = ingest_document(
        &state.config,
        &state.pool,
        state.index.as_ref(),
        state.embedder.clone(),
        state.ocr.as_ref(),
        std::path::Path::new(&req.path),
        override_kind,
    )
    .await?;

    Ok(Json(report.into()))
}

#[derive(Serialize)]
struct DocumentSummary {
    id: String,
    filename: String,
    kind: String,
    created_at: i64,
}

async fn list_documents(
    State(state): State<AppState>,
) -> Result<Json<Vec<DocumentSummary>>, AppError> {
    let docs = store::list_documents(&state.pool).await?;
    Ok(Json(
        docs.into_iter()
            .map(|d| DocumentSummary {
                id: d.id,
                filename: d.filename,
                kind: d.kind,
                created_at: d.created_at,
            })
            .collect(),
    ))
}

async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<export::DocumentExport>, AppError> {
    match export::build_export(&state.pool, &id).await? {
        Some(doc) => Ok(Json(doc)),
        None => Err(not_found(format!("no such document: {}", id))),
    }
}

async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let deleted = store::delete_document(&state.pool, state.index.as_ref(), &id).await?;
    if deleted {
        Ok(Json(serde_json::json!({ "deleted": id })))
    } else {
        Err(not_found(format!("no such document: {}", id)))
    }
}

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    k: Option<usize>,
    #[serde(default)]
    themes: bool,
}

#[derive(Serialize)]
struct AskResponse {
    rows: Vec<AnswerRow>,
    theme_rows: Option<Vec<AnswerRow>>,
}

async fn ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let embedder = state
        .embedder
        .clone()
        .ok_or_else(|| unavailable("embedding provider is disabled"))?;
    let generator = state
        .generator
        .clone()
        .ok_or_else(|| unavailable("generative provider is disabled"))?;

    let k = req.k.unwrap_or(state.config.retrieval.top_k);
    let rows = answer_question(
        &state.pool,
        &embedder,
        state.index.as_ref(),
        &generator,
        &req.question,
        k,
    )
    .await?;

    let theme_rows = if req.themes {
        Some(synthesize_themes(&generator, &rows).await?)
    } else {
        None
    };

    Ok(Json(AskResponse { rows, theme_rows }))
}

#[derive(Deserialize)]
struct ThemesRequest {
    rows: Vec<AnswerRow>,
}

async fn themes(
    State(state): State<AppState>,
    Json(req): Json<ThemesRequest>,
) -> Result<Json<Vec<AnswerRow>>, AppError> {
    let generator = state
        .generator
        .clone()
        .ok_or_else(|| unavailable("generative provider is disabled"))?;
    let rows = synthesize_themes(&generator, &req.rows).await?;
    Ok(Json(rows))
}
