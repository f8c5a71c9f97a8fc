pub mod ga4;
pub mod gsc;

pub use ga4::AnalyticsDataClient;
pub use gsc::SearchConsoleClient;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::{DateRange, MetricSeries, QueryRow};

#[async_trait::async_trait]
pub trait GscFetcher: Send + Sync {
    async fn fetch(&self, property_url: &str, range: DateRange) -> AppResult<MetricSeries>;

    async fn fetch_queries(&self, property_url: &str, range: DateRange) -> AppResult<Vec<QueryRow>>;
}

/// Exact-match dimension filter for GA4 reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ga4Filter {
    pub field: String,
    pub value: String,
}

impl Ga4Filter {
    pub fn organic_search() -> Vec<Ga4Filter> {
        vec![Ga4Filter {
            field: "sessionDefaultChannelGroup".to_string(),
            value: "Organic Search".to_string(),
        }]
    }
}

#[async_trait::async_trait]
pub trait Ga4Fetcher: Send + Sync {
    async fn fetch(
        &self,
        property_id: &str,
        range: DateRange,
        filters: &[Ga4Filter],
    ) -> AppResult<MetricSeries>;
}

/// Maps a non-success Google API response to the pipeline taxonomy.
pub(crate) async fn check_response(
    response: reqwest::Response,
    api: &str,
) -> AppResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = format!("{api} returned {status}: {}", truncate(&body, 300));
    match status {
        reqwest::StatusCode::UNAUTHORIZED => Err(AppError::Authentication(detail)),
        // the token is valid but this property was never shared with the account
        reqwest::StatusCode::FORBIDDEN => Err(AppError::PermissionDenied(detail)),
        _ => Err(AppError::Fetch(detail)),
    }
}

pub(crate) fn transport_error(api: &str, err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::Fetch(format!("{api} request timed out"))
    } else {
        AppError::Fetch(format!("{api} request failed: {err}"))
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
