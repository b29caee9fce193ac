use axum::{
    Router,
    extract::{Json, Multipart, State},
    response::IntoResponse,
    routing::post,
};

use crate::AppState;
use crate::models::TIMEFRAME_FIELDS;
use crate::routes::{ApiError, ErrorBody, FormField, backend_error, read_form};

pub fn analysis_routes() -> Router<AppState> {
    Router::new().route("/analyze", post(analyze))
}

/// Forwards the per-timeframe chart images. Fields other than the known
/// timeframe files are dropped.
async fn analyze(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let files: Vec<_> = read_form(multipart)
        .await?
        .into_iter()
        .filter_map(|field| match field {
            FormField::File(file) if TIMEFRAME_FIELDS.contains(&file.field.as_str()) => Some(file),
            _ => None,
        })
        .collect();

    tracing::info!(
        timeframes = ?files.iter().map(|f| f.field.as_str()).collect::<Vec<_>>(),
        "Submitting charts for analysis"
    );

    let result = state
        .backend
        .analyze_charts(files)
        .await
        .map_err(|e| backend_error(e, ErrorBody::Detailed))?;

    Ok(Json(result))
}
