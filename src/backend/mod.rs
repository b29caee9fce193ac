use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    Response,
    multipart::{Form, Part},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::ClientError;
use crate::models::{Comment, CreateComment, HistoryQuery, NewCommentPayload, TradeReviewPage, UpdateAnalysis};
use crate::poller::CommentSource;

pub const DEFAULT_API_URL: &str = "http://localhost:8767";
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_IMAGE_CONTENT_TYPE: &str = "image/jpeg";

/// A file taken from an incoming multipart request, ready to be re-sent.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub field: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl UploadFile {
    fn into_part(self) -> Result<(String, Part), ClientError> {
        let mut part = Part::bytes(self.data).file_name(self.file_name);
        if let Some(content_type) = self.content_type.as_deref() {
            part = part.mime_str(content_type)?;
        }
        Ok((self.field, part))
    }
}

#[derive(Debug, Clone)]
pub struct TradeAnalysisUpload {
    pub chart_image: UploadFile,
    pub currency_pair: String,
    pub timeframe: String,
    pub trade_direction: Option<String>,
    pub additional_context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub content_type: String,
    pub data: Vec<u8>,
}

/// HTTP client for the remote analysis backend.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::InvalidBaseUrl(base_url));
        }

        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ============================
    // Comments
    // ============================

    pub async fn list_comments<T: DeserializeOwned>(&self, forecast_id: i64) -> Result<T, ClientError> {
        let url = self.url(&format!("/api/v1/comments/forecasts/{}/comments", forecast_id));
        let response = self.http.get(url).send().await?;
        read_json(response).await
    }

    pub async fn create_comment<T: DeserializeOwned>(
        &self,
        forecast_id: i64,
        input: &CreateComment,
    ) -> Result<T, ClientError> {
        let payload = NewCommentPayload::new(forecast_id, input);
        let response = self
            .http
            .post(self.url("/api/v1/comments/comments"))
            .json(&payload)
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn update_analysis<B, T>(&self, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.url("/api/v1/comments/update-analysis"))
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }

    // ============================
    // Forecasts and history
    // ============================

    pub async fn analyze_charts(&self, files: Vec<UploadFile>) -> Result<Value, ClientError> {
        let mut form = Form::new();
        for file in files {
            let (field, part) = file.into_part()?;
            form = form.part(field, part);
        }

        let response = self
            .http
            .post(self.url("/api/v1/analysis/analyze/v2"))
            .multipart(form)
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn list_history(&self, query: &HistoryQuery) -> Result<Value, ClientError> {
        let response = self
            .http
            .get(self.url("/api/v1/history/"))
            .query(&query.to_pairs())
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn get_history(&self, forecast_id: i64) -> Result<Value, ClientError> {
        let url = self.url(&format!("/api/v1/history/{}", forecast_id));
        let response = self.http.get(url).send().await?;
        read_json(response).await
    }

    pub async fn get_history_image(&self, image_id: i64) -> Result<ImagePayload, ClientError> {
        let url = self.url(&format!("/api/v1/history/image/{}", image_id));
        let response = ensure_success(self.http.get(url).send().await?).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(DEFAULT_IMAGE_CONTENT_TYPE)
            .to_string();
        let data = response.bytes().await?.to_vec();

        Ok(ImagePayload { content_type, data })
    }

    // ============================
    // Reviews
    // ============================

    pub async fn get_forecast_reviews(&self, forecast_id: i64) -> Result<Value, ClientError> {
        let url = self.url(&format!("/api/v1/review/{}", forecast_id));
        let response = self.http.get(url).send().await?;
        read_json(response).await
    }

    pub async fn list_review_comments(&self, review_id: i64) -> Result<Value, ClientError> {
        let url = self.url(&format!("/api/v1/review/review/{}/comments", review_id));
        let response = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn create_review_comment(&self, review_id: i64, body: &Value) -> Result<Value, ClientError> {
        let url = self.url(&format!("/api/v1/review/review/{}/comments", review_id));
        let response = self
            .http
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }

    // ============================
    // Trade reviews
    // ============================

    pub async fn list_trade_reviews(&self, skip: i64, limit: i64) -> Result<TradeReviewPage, ClientError> {
        let response = self
            .http
            .get(self.url("/api/v1/trade-review/"))
            .query(&[("skip", skip), ("limit", limit)])
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn analyze_trade(&self, upload: TradeAnalysisUpload) -> Result<Value, ClientError> {
        let (field, part) = upload.chart_image.into_part()?;
        let mut form = Form::new()
            .part(field, part)
            .text("currency_pair", upload.currency_pair)
            .text("timeframe", upload.timeframe);
        if let Some(trade_direction) = upload.trade_direction {
            form = form.text("trade_direction", trade_direction);
        }
        if let Some(additional_context) = upload.additional_context {
            form = form.text("additional_context", additional_context);
        }

        let response = self
            .http
            .post(self.url("/api/v1/trade-review/analyze"))
            .multipart(form)
            .send()
            .await?;
        read_json(response).await
    }
}

#[async_trait]
impl CommentSource for BackendClient {
    async fn fetch_comments(&self, forecast_id: i64) -> Result<Vec<Comment>, ClientError> {
        self.list_comments(forecast_id).await
    }

    async fn submit_comment(&self, forecast_id: i64, input: &CreateComment) -> Result<Comment, ClientError> {
        self.create_comment(forecast_id, input).await
    }

    async fn submit_update(&self, request: &UpdateAnalysis) -> Result<Value, ClientError> {
        self.update_analysis(request).await
    }
}

async fn ensure_success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ClientError::upstream(status, body))
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let response = ensure_success(response).await?;
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}
