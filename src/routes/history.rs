use axum::{
    Router,
    extract::{Json, Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use serde_json::json;

use crate::AppState;
use crate::error::ClientError;
use crate::models::HistoryQuery;
use crate::routes::{ApiError, ErrorBody, backend_error};

pub const HISTORY_IMAGE_CACHE_CONTROL: &str = "public, max-age=31536000";

pub fn history_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_history))
        .route("/{forecast_id}", get(get_history))
        .route("/image/{image_id}", get(get_history_image))
}

async fn list_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .backend
        .list_history(&query)
        .await
        .map_err(|e| backend_error(e, ErrorBody::Detailed))?;

    Ok(Json(result))
}

async fn get_history(
    State(state): State<AppState>,
    Path(forecast_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .backend
        .get_history(forecast_id)
        .await
        .map_err(|e| backend_error(e, ErrorBody::Detailed))?;

    Ok(Json(result))
}

async fn get_history_image(
    State(state): State<AppState>,
    Path(image_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let image = state
        .backend
        .get_history_image(image_id)
        .await
        .map_err(|error| match error {
            ClientError::Upstream { status, reason, .. } => (
                StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
                Json(json!({"error": format!("Failed to fetch image: {}", reason)})),
            ),
            other => {
                tracing::error!(image_id, "Image fetch error: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Failed to fetch image",
                        "details": other.to_string(),
                    })),
                )
            }
        })?;

    Ok((
        [
            (header::CONTENT_TYPE, image.content_type),
            (header::CACHE_CONTROL, HISTORY_IMAGE_CACHE_CONTROL.to_string()),
        ],
        image.data,
    ))
}
