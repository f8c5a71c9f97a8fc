use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{Ga4Fetcher, Ga4Filter, check_response, transport_error};
use crate::auth::{Service, TokenProvider};
use crate::error::{AppError, AppResult};
use crate::models::series::GA4_METRICS;
use crate::models::{DateRange, MetricSeries, Source};

const API: &str = "Analytics Data";

pub struct AnalyticsDataClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunReportResponse {
    #[serde(default)]
    metric_headers: Vec<Header>,
    #[serde(default)]
    rows: Vec<ReportRow>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportRow {
    #[serde(default)]
    dimension_values: Vec<Cell>,
    #[serde(default)]
    metric_values: Vec<Cell>,
}

#[derive(Debug, Deserialize)]
struct Cell {
    #[serde(default)]
    value: String,
}

impl AnalyticsDataClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }
}

/// Single filter as-is, several combined with `andGroup`.
pub(crate) fn dimension_filter(filters: &[Ga4Filter]) -> Option<Value> {
    let mut expressions: Vec<Value> = filters
        .iter()
        .map(|f| {
            json!({
                "filter": {
                    "fieldName": f.field,
                    "stringFilter": { "matchType": "EXACT", "value": f.value }
                }
            })
        })
        .collect();

    match expressions.len() {
        0 => None,
        1 => expressions.pop(),
        _ => Some(json!({ "andGroup": { "expressions": expressions } })),
    }
}

pub(crate) fn run_report_body(range: DateRange, filters: &[Ga4Filter]) -> Value {
    let metrics: Vec<Value> = GA4_METRICS
        .iter()
        .map(|m| json!({ "name": m.name }))
        .collect();

    let mut body = json!({
        "dateRanges": [{
            "startDate": range.start.to_string(),
            "endDate": range.end.to_string(),
        }],
        "dimensions": [{ "name": "date" }],
        "metrics": metrics,
        "keepEmptyRows": false,
    });
    if let Some(filter) = dimension_filter(filters) {
        body["dimensionFilter"] = filter;
    }
    body
}

#[async_trait::async_trait]
impl Ga4Fetcher for AnalyticsDataClient {
    #[tracing::instrument(
        name = "fetch ga4",
        skip(self, filters),
        fields(ga4.rows, ga4.filters = filters.len(), range = %range)
    )]
    async fn fetch(
        &self,
        property_id: &str,
        range: DateRange,
        filters: &[Ga4Filter],
    ) -> AppResult<MetricSeries> {
        let token = self.tokens.get_token(Service::Analytics).await?;
        let url = format!(
            "{}/v1beta/properties/{}:runReport",
            self.base_url,
            urlencoding::encode(property_id.trim_start_matches("properties/"))
        );

        let response = self
            .http
            .post(url)
            .bearer_auth(&token.value)
            .json(&run_report_body(range, filters))
            .send()
            .await
            .map_err(|e| transport_error(API, e))?;

        let report: RunReportResponse = check_response(response, API)
            .await?
            .json()
            .await
            .map_err(|e| AppError::Fetch(format!("{API} returned an unreadable body: {e}")))?;

        let mut series = MetricSeries::new(Source::Ga4, range);
        for row in &report.rows {
            let Some(date) = row
                .dimension_values
                .first()
                .and_then(|c| NaiveDate::parse_from_str(&c.value, "%Y%m%d").ok())
            else {
                continue;
            };
            for (header, cell) in report.metric_headers.iter().zip(&row.metric_values) {
                match cell.value.parse::<f64>() {
                    Ok(value) => series.push(date, &header.name, value),
                    Err(_) => tracing::warn!(
                        metric = %header.name,
                        value = %cell.value,
                        "Skipping unparseable GA4 metric value"
                    ),
                }
            }
        }
        series.sort();

        tracing::Span::current().record("ga4.rows", report.rows.len());
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2026, 9, 16).unwrap(),
            NaiveDate::from_ymd_opt(2026, 10, 15).unwrap(),
        )
    }

    #[test]
    fn test_organic_filter_body() {
        let body = run_report_body(range(), &Ga4Filter::organic_search());
        assert_eq!(body["dateRanges"][0]["startDate"], "2026-09-16");
        assert_eq!(body["metrics"].as_array().unwrap().len(), GA4_METRICS.len());
        assert_eq!(
            body["dimensionFilter"]["filter"]["fieldName"],
            "sessionDefaultChannelGroup"
        );
        assert_eq!(
            body["dimensionFilter"]["filter"]["stringFilter"]["value"],
            "Organic Search"
        );
    }

    #[test]
    fn test_no_filters_omits_dimension_filter() {
        let body = run_report_body(range(), &[]);
        assert!(body.get("dimensionFilter").is_none());
    }

    #[test]
    fn test_multiple_filters_use_and_group() {
        let filters = vec![
            Ga4Filter {
                field: "country".to_string(),
                value: "Canada".to_string(),
            },
            Ga4Filter {
                field: "deviceCategory".to_string(),
                value: "mobile".to_string(),
            },
        ];
        let filter = dimension_filter(&filters).unwrap();
        assert_eq!(filter["andGroup"]["expressions"].as_array().unwrap().len(), 2);
    }
}
