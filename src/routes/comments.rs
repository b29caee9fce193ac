use std::sync::Arc;

use axum::{
    Router,
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;
use serde_json::Value;

use crate::AppState;
use crate::models::{AskQuestion, Comment, CreateComment, find_answer};
use crate::poller::{self, WaitBindings, WaitState};
use crate::routes::{ApiError, ErrorBody, backend_error, bad_request};

#[derive(Debug, Serialize)]
struct AskResponse {
    question: Comment,
    answer: Option<Comment>,
    outcome: WaitState,
}

pub fn comments_routes() -> Router<AppState> {
    Router::new()
        .route("/update-analysis", post(update_analysis))
        .route("/{forecast_id}", get(list_comments))
        .route("/{forecast_id}/create", post(create_comment))
        .route("/{forecast_id}/ask", post(ask_question))
}

async fn list_comments(
    State(state): State<AppState>,
    Path(forecast_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let comments: Value = state
        .backend
        .list_comments(forecast_id)
        .await
        .map_err(|e| backend_error(e, ErrorBody::Fixed("Failed to fetch comments")))?;

    Ok(Json(comments))
}

async fn create_comment(
    State(state): State<AppState>,
    Path(forecast_id): Path<i64>,
    Json(input): Json<CreateComment>,
) -> Result<impl IntoResponse, ApiError> {
    if input.content.trim().is_empty() {
        return Err(bad_request("Comment content is required"));
    }

    let created: Value = state
        .backend
        .create_comment(forecast_id, &input)
        .await
        .map_err(|e| backend_error(e, ErrorBody::BodyOr("Failed to create comment")))?;

    Ok(Json(created))
}

async fn update_analysis(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let updated: Value = state
        .backend
        .update_analysis(&body)
        .await
        .map_err(|e| backend_error(e, ErrorBody::BodyOr("Failed to update analysis")))?;

    Ok(Json(updated))
}

/// Posts a question and holds the request open until the AI answer shows up
/// or the poll deadline passes. Dropping the request cancels the wait.
async fn ask_question(
    State(state): State<AppState>,
    Path(forecast_id): Path<i64>,
    Json(input): Json<AskQuestion>,
) -> Result<impl IntoResponse, ApiError> {
    let content = input.content.trim();
    if content.is_empty() {
        return Err(bad_request("Comment content is required"));
    }

    let mut request = CreateComment::question(content);
    request.extra_metadata = input.extra_metadata;

    let question: Comment = state
        .backend
        .create_comment(forecast_id, &request)
        .await
        .map_err(|e| backend_error(e, ErrorBody::BodyOr("Failed to create comment")))?;

    let bindings = WaitBindings::new();
    let wait = poller::start(
        Arc::new(state.backend.clone()),
        forecast_id,
        state.poll,
        bindings.clone(),
    )
    .await;

    // the wait targets the latest question, which may not be ours
    let (target_id, outcome) = match wait {
        Some(wait) => (wait.question_id(), wait.finish().await),
        None => (question.id, WaitState::Idle),
    };

    let answer = find_answer(&bindings.comments(), target_id).cloned();
    tracing::info!(forecast_id, question_id = target_id, outcome = ?outcome, "Question settled");

    Ok(Json(AskResponse {
        question,
        answer,
        outcome,
    }))
}
