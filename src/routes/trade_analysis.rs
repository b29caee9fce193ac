use axum::{
    Router,
    extract::{Json, Multipart, Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
};

use crate::AppState;
use crate::backend::{TradeAnalysisUpload, UploadFile};
use crate::models::{TradeAnalysisListResponse, TradeAnalysisQuery};
use crate::routes::{ApiError, ErrorBody, FormField, backend_error, bad_request, read_form};

pub const PLACEHOLDER_CACHE_CONTROL: &str = "public, max-age=3600";

pub fn trade_analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_trade_analyses))
        .route("/create", post(create_trade_analysis))
        .route("/image/{image_id}", get(placeholder_image))
}

async fn list_trade_analyses(
    State(state): State<AppState>,
    Query(query): Query<TradeAnalysisQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(10);
    if page < 1 || limit < 1 {
        return Err(bad_request("page and limit must be positive"));
    }

    let skip = (page - 1)
        .checked_mul(limit)
        .ok_or_else(|| bad_request("page and limit are too large"))?;
    let reviews = state
        .backend
        .list_trade_reviews(skip, limit)
        .await
        .map_err(|e| backend_error(e, ErrorBody::BodyOr("Failed to fetch trade reviews")))?;

    Ok(Json(TradeAnalysisListResponse::from_page(reviews, page, limit)))
}

async fn create_trade_analysis(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let upload = parse_trade_upload(read_form(multipart).await?)?;

    tracing::info!(
        currency_pair = %upload.currency_pair,
        timeframe = %upload.timeframe,
        trade_direction = ?upload.trade_direction,
        has_context = upload.additional_context.is_some(),
        "Sending trade analysis to backend"
    );

    let result = state
        .backend
        .analyze_trade(upload)
        .await
        .map_err(|e| backend_error(e, ErrorBody::BodyOr("Failed to create trade analysis")))?;

    Ok(Json(result))
}

fn parse_trade_upload(fields: Vec<FormField>) -> Result<TradeAnalysisUpload, ApiError> {
    let mut chart_image: Option<UploadFile> = None;
    let mut currency_pair = None;
    let mut timeframe = None;
    let mut trade_direction = None;
    let mut additional_context = None;

    for field in fields {
        match field {
            FormField::File(file) if file.field == "chart_image" => chart_image = Some(file),
            FormField::File(_) => {}
            FormField::Text(name, value) => {
                let value = Some(value).filter(|v| !v.is_empty());
                match name.as_str() {
                    "currency_pair" => currency_pair = value,
                    "timeframe" => timeframe = value,
                    "trade_direction" => trade_direction = value,
                    "additional_context" => additional_context = value,
                    _ => {}
                }
            }
        }
    }

    let chart_image = chart_image.ok_or_else(|| bad_request("Chart image is required"))?;
    let (Some(currency_pair), Some(timeframe)) = (currency_pair, timeframe) else {
        return Err(bad_request("Currency pair and timeframe are required"));
    };

    Ok(TradeAnalysisUpload {
        chart_image,
        currency_pair,
        timeframe,
        trade_direction,
        additional_context,
    })
}

// TODO: proxy /api/v1/trade-analysis/image/{id} once the backend serves trade chart images.
async fn placeholder_image(Path(image_id): Path<i64>) -> impl IntoResponse {
    let svg = format!(
        r##"<svg width="400" height="300" xmlns="http://www.w3.org/2000/svg">
  <rect width="400" height="300" fill="#f0f0f0"/>
  <text x="200" y="150" font-family="Arial" font-size="16" text-anchor="middle" fill="#666">Chart Image {}</text>
  <text x="200" y="170" font-family="Arial" font-size="12" text-anchor="middle" fill="#999">(Placeholder)</text>
</svg>"##,
        image_id
    );

    (
        [
            (header::CONTENT_TYPE, "image/svg+xml"),
            (header::CACHE_CONTROL, PLACEHOLDER_CACHE_CONTROL),
        ],
        svg,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn chart() -> FormField {
        FormField::File(UploadFile {
            field: "chart_image".to_string(),
            file_name: "eurusd.png".to_string(),
            content_type: Some("image/png".to_string()),
            data: vec![0x89, b'P', b'N', b'G'],
        })
    }

    fn text(name: &str, value: &str) -> FormField {
        FormField::Text(name.to_string(), value.to_string())
    }

    #[test]
    fn requires_chart_image() {
        let (status, Json(body)) =
            parse_trade_upload(vec![text("currency_pair", "EURUSD"), text("timeframe", "1h")]).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Chart image is required");
    }

    #[test]
    fn requires_pair_and_timeframe() {
        let (_, Json(body)) =
            parse_trade_upload(vec![chart(), text("currency_pair", "EURUSD"), text("timeframe", "")]).unwrap_err();
        assert_eq!(body["error"], "Currency pair and timeframe are required");
    }

    #[test]
    fn keeps_optional_fields_only_when_present() {
        let upload = parse_trade_upload(vec![
            chart(),
            text("currency_pair", "USDJPY"),
            text("timeframe", "4h"),
            text("trade_direction", "long"),
            text("additional_context", ""),
            text("unrelated", "x"),
        ])
        .unwrap();

        assert_eq!(upload.currency_pair, "USDJPY");
        assert_eq!(upload.timeframe, "4h");
        assert_eq!(upload.trade_direction.as_deref(), Some("long"));
        assert!(upload.additional_context.is_none());
        assert_eq!(upload.chart_image.file_name, "eurusd.png");
    }
}
