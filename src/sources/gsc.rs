use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use super::{GscFetcher, check_response, transport_error};
use crate::auth::{Service, TokenProvider};
use crate::error::{AppError, AppResult};
use crate::models::{DateRange, MetricSeries, QueryRow, Source};

const API: &str = "Search Console";

pub struct SearchConsoleClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
    row_limit: u32,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    rows: Vec<ResponseRow>,
}

#[derive(Debug, Deserialize)]
struct ResponseRow {
    #[serde(default)]
    keys: Vec<String>,
    #[serde(default)]
    clicks: f64,
    #[serde(default)]
    impressions: f64,
    #[serde(default)]
    ctr: f64,
    #[serde(default)]
    position: f64,
}

impl SearchConsoleClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
        row_limit: u32,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
            row_limit,
        }
    }

    fn endpoint(&self, property_url: &str) -> String {
        format!(
            "{}/webmasters/v3/sites/{}/searchAnalytics/query",
            self.base_url,
            urlencoding::encode(property_url)
        )
    }

    async fn query(
        &self,
        property_url: &str,
        range: DateRange,
        dimension: &str,
    ) -> AppResult<Vec<ResponseRow>> {
        let token = self.tokens.get_token(Service::SearchConsole).await?;
        let body = json!({
            "startDate": range.start.to_string(),
            "endDate": range.end.to_string(),
            "dimensions": [dimension],
            "rowLimit": self.row_limit,
            "dataState": "final",
        });

        let response = self
            .http
            .post(self.endpoint(property_url))
            .bearer_auth(&token.value)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(API, e))?;

        let parsed: QueryResponse = check_response(response, API)
            .await?
            .json()
            .await
            .map_err(|e| AppError::Fetch(format!("{API} returned an unreadable body: {e}")))?;
        Ok(parsed.rows)
    }
}

#[async_trait::async_trait]
impl GscFetcher for SearchConsoleClient {
    #[tracing::instrument(
        name = "fetch gsc",
        skip(self),
        fields(gsc.rows, range = %range)
    )]
    async fn fetch(&self, property_url: &str, range: DateRange) -> AppResult<MetricSeries> {
        let rows = self.query(property_url, range, "date").await?;

        let mut series = MetricSeries::new(Source::Gsc, range);
        for row in &rows {
            let Some(date) = row
                .keys
                .first()
                .and_then(|k| NaiveDate::parse_from_str(k, "%Y-%m-%d").ok())
            else {
                tracing::warn!(keys = ?row.keys, "Skipping Search Console row without a date key");
                continue;
            };
            series.push(date, "clicks", row.clicks);
            series.push(date, "impressions", row.impressions);
            series.push(date, "ctr", row.ctr);
            series.push(date, "position", row.position);
        }
        series.sort();

        tracing::Span::current().record("gsc.rows", rows.len());
        Ok(series)
    }

    #[tracing::instrument(
        name = "fetch gsc queries",
        skip(self),
        fields(gsc.rows, range = %range)
    )]
    async fn fetch_queries(&self, property_url: &str, range: DateRange) -> AppResult<Vec<QueryRow>> {
        let rows = self.query(property_url, range, "query").await?;
        tracing::Span::current().record("gsc.rows", rows.len());

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let query = row.keys.into_iter().next()?;
                Some(QueryRow {
                    query,
                    clicks: row.clicks,
                    impressions: row.impressions,
                    ctr: row.ctr,
                    position: row.position,
                })
            })
            .collect())
    }
}
