use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const TIMEFRAME_FIELDS: [&str; 6] = [
    "timeframe_1m",
    "timeframe_5m",
    "timeframe_15m",
    "timeframe_1h",
    "timeframe_4h",
    "timeframe_d1",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub currency_pair: Option<String>,
}

impl HistoryQuery {
    /// Query pairs forwarded to the backend, with the same defaults the
    /// dashboard uses.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.unwrap_or(1).to_string()),
            ("per_page", self.per_page.unwrap_or(10).to_string()),
        ];
        if let Some(currency_pair) = self.currency_pair.as_deref().filter(|v| !v.is_empty()) {
            pairs.push(("currency_pair", currency_pair.to_string()));
        }
        pairs
    }
}

#[derive(Debug, Deserialize)]
pub struct TradeAnalysisQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// One page of trade reviews as the backend returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct TradeReviewPage {
    #[serde(default)]
    pub reviews: Vec<Value>,
    #[serde(default)]
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeAnalysisListResponse {
    pub analyses: Vec<Value>,
    pub total_pages: i64,
    pub current_page: i64,
    pub total_count: i64,
}

impl TradeAnalysisListResponse {
    pub fn from_page(page: TradeReviewPage, current_page: i64, limit: i64) -> Self {
        let total = page.total.max(0);
        let total_pages = if limit > 0 {
            total / limit + i64::from(total % limit != 0)
        } else {
            0
        };

        Self {
            analyses: page.reviews,
            total_pages,
            current_page,
            total_count: page.total,
        }
    }
}
