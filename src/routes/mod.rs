pub mod analysis;
pub mod comments;
pub mod history;
pub mod reviews;
pub mod trade_analysis;

pub use analysis::analysis_routes;
pub use comments::comments_routes;
pub use history::history_routes;
pub use reviews::{review_comments_routes, review_routes};
pub use trade_analysis::trade_analysis_routes;

use axum::{Json, extract::Multipart, http::StatusCode};
use serde_json::{Value, json};

use crate::backend::UploadFile;
use crate::error::ClientError;

pub type ApiError = (StatusCode, Json<Value>);

/// How an upstream failure is reported to the caller.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ErrorBody {
    /// `{error: <message>}` regardless of what the backend said.
    Fixed(&'static str),
    /// `{error: <backend body>}`, or the message when the body is empty.
    BodyOr(&'static str),
    /// `{error: "Backend API error: <reason>", details: <backend body>}`.
    Detailed,
}

pub(crate) fn backend_error(error: ClientError, shape: ErrorBody) -> ApiError {
    match error {
        ClientError::Upstream {
            status,
            reason,
            body,
        } => {
            tracing::error!(status = status.as_u16(), "Backend API error: {}", body);
            let status =
                StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
            let payload = match shape {
                ErrorBody::Fixed(message) => json!({"error": message}),
                ErrorBody::BodyOr(message) => {
                    let message = if body.is_empty() { message.to_string() } else { body };
                    json!({"error": message})
                }
                ErrorBody::Detailed => json!({
                    "error": format!("Backend API error: {}", reason),
                    "details": body,
                }),
            };
            (status, Json(payload))
        }
        other => {
            tracing::error!("Backend request failed: {}", other);
            let payload = match shape {
                ErrorBody::Detailed => json!({
                    "error": "Internal server error",
                    "details": other.to_string(),
                }),
                _ => json!({"error": "Internal server error"}),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload))
        }
    }
}

pub(crate) fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": message.into()})),
    )
}

/// One field of an incoming multipart form.
pub(crate) enum FormField {
    File(UploadFile),
    Text(String, String),
}

pub(crate) async fn read_form(mut multipart: Multipart) -> Result<Vec<FormField>, ApiError> {
    let mut fields = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        match file_name {
            Some(file_name) => {
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("Failed to read file {}: {}", name, e)))?;
                fields.push(FormField::File(UploadFile {
                    field: name,
                    file_name,
                    content_type,
                    data: data.to_vec(),
                }));
            }
            None => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("Failed to read field {}: {}", name, e)))?;
                fields.push(FormField::Text(name, value));
            }
        }
    }

    Ok(fields)
}
