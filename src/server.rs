//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/submissions` | Create a submission from files or pasted text |
//! | `GET`  | `/submissions/{id}` | Submission status and its documents |
//! | `GET`  | `/documents/{id}` | One document with its texts |
//! | `GET`  | `/documents/{id}/results` | Match results in creation order |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! `POST /submissions` accepts either `multipart/form-data` (one or more
//! `files` parts and an optional `email` part, answered with `201 Created`)
//! or a `text/plain` body with an optional `?email=` query parameter
//! (answered with `200 OK`). Any other content type is a `400`.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "no files in upload" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Query, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use antiplag_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::intake::{create_submission, IntakeError, Upload, UploadedFile};
use crate::migrate;
use crate::queue::JobQueue;
use crate::services::build_services;
use crate::sqlite_store::SqliteStore;
use crate::status::{document_view, results_view, submission_view};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub queue: JobQueue,
    pub max_upload_bytes: usize,
}

/// Starts the server on `[server].bind`, along with the worker pool, and
/// re-enqueues submissions left `PENDING` by a previous process.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;

    let services = build_services(config, &pool)?;
    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool));
    let (queue, _workers) = JobQueue::start(
        store.clone(),
        services,
        config.run_settings(),
        config.worker.concurrency,
        config.worker.queue_capacity,
    );

    let recovered = queue.recover_pending(store.as_ref()).await?;
    if recovered > 0 {
        info!(recovered, "pending submissions scheduled");
    }

    let app = build_router(AppState {
        store,
        queue,
        max_upload_bytes: config.server.max_upload_bytes,
    });

    let bind_addr = config.server.bind.clone();
    println!("Antiplag server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/submissions", post(handle_create_submission))
        .route("/submissions/{id}", get(handle_get_submission))
        .route("/documents/{id}", get(handle_get_document))
        .route("/documents/{id}/results", get(handle_get_results))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
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

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        error!(error = %err, "request failed");
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            message: err.to_string(),
        }
    }
}

impl From<IntakeError> for AppError {
    fn from(err: IntakeError) -> Self {
        match err {
            IntakeError::Storage(e) => e.into(),
            other => bad_request(other.to_string()),
        }
    }
}

// ============ Handlers ============

#[derive(Debug, Deserialize)]
struct EmailQuery {
    email: Option<String>,
}

enum Intake {
    Multipart,
    Text,
}

fn classify(req: &Request<Body>) -> Option<Intake> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)?
        .to_str()
        .ok()?
        .to_ascii_lowercase();
    if content_type.starts_with("multipart/form-data") {
        Some(Intake::Multipart)
    } else if content_type.starts_with("text/plain") {
        Some(Intake::Text)
    } else {
        None
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<(Upload, Option<String>), AppError> {
    let mut files = Vec::new();
    let mut email = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.to_string()))?
    {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("files") => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(e.to_string()))?;
                files.push(UploadedFile {
                    name,
                    content_type,
                    data: data.to_vec(),
                });
            }
            Some("email") => {
                email = Some(field.text().await.map_err(|e| bad_request(e.to_string()))?);
            }
            _ => {}
        }
    }

    Ok((Upload::Files(files), email))
}

async fn handle_create_submission(
    State(state): State<AppState>,
    req: Request,
) -> Result<Response, AppError> {
    let (upload, email, status) = match classify(&req) {
        Some(Intake::Multipart) => {
            let multipart = Multipart::from_request(req, &state)
                .await
                .map_err(|e| bad_request(e.to_string()))?;
            let (upload, email) = read_multipart(multipart).await?;
            (upload, email, StatusCode::CREATED)
        }
        Some(Intake::Text) => {
            let email = Query::<EmailQuery>::try_from_uri(req.uri())
                .map_err(|e| bad_request(e.to_string()))?
                .0
                .email;
            let body = axum::body::to_bytes(req.into_body(), state.max_upload_bytes)
                .await
                .map_err(|e| bad_request(e.to_string()))?;
            (Upload::Text(body.to_vec()), email, StatusCode::OK)
        }
        None => {
            return Err(bad_request(
                "content type must be multipart/form-data or text/plain",
            ))
        }
    };

    let view = create_submission(state.store.as_ref(), upload, email).await?;
    if let Err(e) = state.queue.try_enqueue(&view.id) {
        // Still PENDING; picked up again on the next start.
        warn!(submission_id = %view.id, error = %e, "could not schedule submission");
    }

    Ok((status, Json(view)).into_response())
}

async fn handle_get_submission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    match submission_view(state.store.as_ref(), &id).await? {
        Some(view) => Ok(Json(view).into_response()),
        None => Err(not_found(format!("submission not found: {}", id))),
    }
}

async fn handle_get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    match document_view(state.store.as_ref(), &id).await? {
        Some(view) => Ok(Json(view).into_response()),
        None => Err(not_found(format!("document not found: {}", id))),
    }
}

async fn handle_get_results(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    match results_view(state.store.as_ref(), &id).await? {
        Some(view) => Ok(Json(view).into_response()),
        None => Err(not_found(format!("document not found: {}", id))),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
