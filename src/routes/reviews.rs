use axum::{
    Router,
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::get,
};
use serde_json::Value;

use crate::AppState;
use crate::routes::{ApiError, ErrorBody, backend_error};

pub fn review_routes() -> Router<AppState> {
    Router::new().route("/{forecast_id}", get(get_forecast_reviews))
}

pub fn review_comments_routes() -> Router<AppState> {
    Router::new().route(
        "/{review_id}/comments",
        get(list_review_comments).post(create_review_comment),
    )
}

/// Forecast detail together with its follow-up reviews.
async fn get_forecast_reviews(
    State(state): State<AppState>,
    Path(forecast_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .backend
        .get_forecast_reviews(forecast_id)
        .await
        .map_err(|e| backend_error(e, ErrorBody::Detailed))?;

    Ok(Json(result))
}

async fn list_review_comments(
    State(state): State<AppState>,
    Path(review_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let comments = state
        .backend
        .list_review_comments(review_id)
        .await
        .map_err(|e| backend_error(e, ErrorBody::BodyOr("Failed to fetch comments")))?;

    Ok(Json(comments))
}

async fn create_review_comment(
    State(state): State<AppState>,
    Path(review_id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let created = state
        .backend
        .create_review_comment(review_id, &body)
        .await
        .map_err(|e| backend_error(e, ErrorBody::BodyOr("Failed to create comment")))?;

    Ok(Json(created))
}
