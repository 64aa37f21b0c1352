use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;
use validator::Validate;

use crate::assistant::{Difficulty, StudyAssistant, StudyError};
use crate::document::DocumentError;
use crate::providers::utils::count_tokens;

const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
const MAX_CONCURRENT_REQUESTS: usize = 32;

#[derive(Clone)]
pub struct AppState {
    assistant: Arc<StudyAssistant>,
}

#[derive(Deserialize, Validate)]
pub struct QuestionRequest {
    #[validate(length(min = 1, max = 4000))]
    question: String,
}

#[derive(Deserialize, Validate, Default)]
pub struct QuizRequest {
    #[validate(length(max = 50000))]
    content: Option<String>,
    #[validate(range(min = 1, max = 10))]
    num: Option<usize>,
    difficulty: Option<String>,
}

#[derive(Serialize)]
pub struct SessionCreated {
    session_id: Uuid,
}

#[derive(Serialize)]
pub struct ReplyResponse {
    reply: String,
    tokens: usize,
}

impl ReplyResponse {
    fn new(reply: String) -> Self {
        let tokens = count_tokens(&reply);
        Self { reply, tokens }
    }
}

#[derive(Serialize)]
struct ApiResponse {
    status: String,
}

/// Error half of every handler: a status code and a `{ "status": ... }` body.
#[derive(Debug)]
pub struct ApiError {
    code: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self { code: StatusCode::BAD_REQUEST, message: message.into() }
    }
}

impl From<StudyError> for ApiError {
    fn from(err: StudyError) -> Self {
        let code = match &err {
            StudyError::UnknownSession(_) => StatusCode::NOT_FOUND,
            StudyError::EmptyInput
            | StudyError::InvalidQuizSize(_)
            | StudyError::InvalidDifficulty(_)
            | StudyError::Document(DocumentError::UnsupportedType(_))
            | StudyError::Document(DocumentError::InvalidName(_)) => StatusCode::BAD_REQUEST,
            StudyError::NoNotes | StudyError::NoContent | StudyError::EmptyDocument(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            StudyError::Busy => StatusCode::CONFLICT,
            StudyError::Provider(_) => StatusCode::BAD_GATEWAY,
            StudyError::Document(_) | StudyError::Database(_) | StudyError::VectorStore(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if code.is_server_error() {
            log::error!("Request failed: {}", err);
        }
        Self { code, message: err.to_string() }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::bad_request(format!("Invalid request: {}", errors))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code, Json(ApiResponse { status: self.message })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Create and configure the API router
pub fn create_api(assistant: Arc<StudyAssistant>) -> Router {
    let state = AppState { assistant };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_check))
        .route("/sessions", post(create_session))
        .route("/sessions/:id", get(get_session))
        .route("/sessions/:id/documents", post(upload_document))
        .route("/sessions/:id/explain", post(explain_handler))
        .route("/sessions/:id/summarize", post(summarize_handler))
        .route("/sessions/:id/quiz", post(quiz_handler))
        .route("/sessions/:id/chat", post(chat_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS))
        .layer(cors)
        .with_state(state)
}

fn session_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(format!("Invalid session id: {}", raw)))
}

async fn health_check(State(state): State<AppState>) -> Response {
    let report = state.assistant.health().await;
    let code = if report.ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(report)).into_response()
}

async fn create_session(State(state): State<AppState>) -> Result<(StatusCode, Json<SessionCreated>), ApiError> {
    let session_id = state.assistant.create_session().await?;
    Ok((StatusCode::CREATED, Json(SessionCreated { session_id })))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<crate::assistant::SessionSnapshot> {
    let id = session_id(&id)?;
    Ok(Json(state.assistant.snapshot(id).await?))
}

async fn upload_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<crate::assistant::UploadReport> {
    let id = session_id(&id)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request("The file field needs a file name"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?;

        log::info!("Upload of {} ({} bytes) for session {}", file_name, bytes.len(), id);
        let report = state.assistant.upload_pdf(id, &file_name, bytes.to_vec()).await?;
        return Ok(Json(report));
    }

    Err(ApiError::bad_request("Missing multipart field 'file'"))
}

async fn explain_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Result<Json<QuestionRequest>, JsonRejection>,
) -> ApiResult<ReplyResponse> {
    let id = session_id(&id)?;
    let Json(request) = request?;
    request.validate()?;

    let reply = state.assistant.explain(id, &request.question).await?;
    Ok(Json(ReplyResponse::new(reply)))
}

async fn summarize_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ReplyResponse> {
    let id = session_id(&id)?;
    let summary = state.assistant.summarize(id).await?;
    Ok(Json(ReplyResponse::new(summary)))
}

async fn quiz_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<ReplyResponse> {
    let id = session_id(&id)?;
    // An empty body asks for a default quiz over the session's notes.
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        QuizRequest::default()
    } else {
        let Json(request) = Json::<QuizRequest>::from_bytes(&body)?;
        request
    };
    request.validate()?;

    let difficulty = request
        .difficulty
        .as_deref()
        .map(str::parse::<Difficulty>)
        .transpose()?;

    let quiz = state
        .assistant
        .generate_quiz(id, request.content.as_deref(), request.num, difficulty)
        .await?;
    Ok(Json(ReplyResponse::new(quiz)))
}

async fn chat_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Result<Json<QuestionRequest>, JsonRejection>,
) -> ApiResult<ReplyResponse> {
    let id = session_id(&id)?;
    let Json(request) = request?;
    request.validate()?;

    let answer = state.assistant.chat_with_notes(id, &request.question).await?;
    Ok(Json(ReplyResponse::new(answer)))
}
