use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use globo_core::types::{ContextEntry, MessageContent, Mode, Role};
use globo_core::{
    BackendError, CredentialCheck, InputError, ModelCatalog, ResponseAssembler, SessionError,
    locale, validate_input,
};
use globo_providers::OpenAiChat;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<OpenAiChat>,
}

/// One completion request as sent by the browser client.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    #[serde(default)]
    message: String,
    #[serde(default)]
    is_image: bool,
    #[serde(default)]
    max_tokens: Option<u32>,
    #[serde(default, rename = "developer_mode")]
    developer_mode: bool,
    #[serde(default)]
    previous_messages: Vec<PreviousMessage>,
}

#[derive(Debug, Deserialize)]
struct PreviousMessage {
    role: String,
    #[serde(default)]
    content: String,
}

impl From<PreviousMessage> for ContextEntry {
    fn from(message: PreviousMessage) -> Self {
        let role = if message.role.eq_ignore_ascii_case("user") {
            Role::User
        } else {
            Role::Assistant
        };
        ContextEntry {
            role,
            content: message.content,
        }
    }
}

/// Every failure is answered with a 400 and a JSON body the client shows as is.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl RelayError {
    fn message(&self) -> String {
        match self {
            RelayError::BadRequest(message) => message.clone(),
            RelayError::Backend(BackendError::Transient(message))
            | RelayError::Backend(BackendError::Malformed(message)) => message.clone(),
            RelayError::Backend(err) => {
                locale::error_notice(Mode::Developer, &SessionError::Backend(err.clone())).message
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        tracing::warn!("Relay request failed: {}", self);
        let body = json!({
            "error": self.message(),
            "details": null,
            "status": "error",
        });
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

fn input_error(err: InputError) -> RelayError {
    RelayError::BadRequest(locale::error_notice(Mode::Developer, &SessionError::Input(err)).message)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/functions/v1/openai", post(complete))
        .route("/functions/v1/list-models", get(list_models))
        .route("/functions/v1/check-openai-key", get(check_key))
        .with_state(state)
}

pub async fn complete(
    State(state): State<AppState>,
    Json(request): Json<CompletionRequest>,
) -> Result<Json<Value>, RelayError> {
    if request.is_image && !MessageContent::parse(&request.message).is_image() {
        return Err(RelayError::BadRequest("Invalid image format".to_string()));
    }
    let content = validate_input(&request.message)
        .map_err(input_error)?;
    if content.is_image() != request.is_image {
        return Err(RelayError::BadRequest("Invalid image format".to_string()));
    }

    let mode = if request.developer_mode {
        Mode::Developer
    } else {
        Mode::Standard
    };
    let context: Vec<ContextEntry> = request
        .previous_messages
        .into_iter()
        .map(ContextEntry::from)
        .collect();

    tracing::info!(
        "Relaying {} request ({} context entries)",
        if request.is_image { "image" } else { "text" },
        context.len()
    );
    let reply = state
        .chat
        .complete_with_limit(&content, mode, &context, request.max_tokens)
        .await?;
    let raw = reply.content.clone();
    let assembled = ResponseAssembler::new().normalize(reply);

    Ok(Json(json!({
        "content": raw,
        "steps": assembled.draft.steps(),
        "send_to_voice": assembled.draft.auto_narrate(),
        "wolfram_query": assembled.visualization_query,
    })))
}

pub async fn list_models(State(state): State<AppState>) -> Result<Json<Value>, RelayError> {
    let models = state.chat.list_models().await?;
    Ok(Json(json!({ "models": models, "status": "success" })))
}

pub async fn check_key(State(state): State<AppState>) -> Response {
    match state.chat.check_credential().await {
        Ok(status) if status.valid => {
            Json(json!({ "status": "success", "message": status.message })).into_response()
        }
        Ok(status) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": "error", "message": status.message })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": "error", "message": e.to_string() })),
        )
            .into_response(),
    }
}
