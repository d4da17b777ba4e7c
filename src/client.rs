// Statistics client - talks to the SendGrid v3 statistics API
//
// This module is responsible for:
// 1. Defining the StatsProvider trait the collector fetches through
// 2. Implementing it over HTTP with bearer-token authentication
// 3. Decoding the provider's JSON payloads into typed results
//
// The collector only ever sees "error" or "valid records"; every transport
// and decoding concern stays behind this boundary.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::ExporterConfig;
use crate::stats::{CategoryStats, DateStats};

/// Date format the statistics API expects in query parameters
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Errors that can occur while fetching statistics
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("statistics request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("statistics API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("statistics API returned an empty result set")]
    EmptyResponse,

    #[error("statistics fetch did not complete within {0:?}")]
    DeadlineExceeded(Duration),
}

/// Source of delivery statistics.
///
/// The collector depends on this trait rather than on the HTTP client so
/// scrape behavior can be tested with injected responses.
#[async_trait]
pub trait StatsProvider: Send + Sync {
    /// Fetches aggregated statistics for each date in `[start, end]`,
    /// ordered by date.
    async fn fetch_by_date(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DateStats>, ProviderError>;

    /// Fetches per-category statistics for a single date.
    async fn fetch_by_category(&self, date: NaiveDate) -> Result<CategoryStats, ProviderError>;
}

/// HTTP client for the SendGrid statistics endpoints
pub struct SendGridClient {
    /// Shared reqwest client (connection pooling, request timeout)
    http: reqwest::Client,

    /// Base URL of the v3 API, without a trailing slash
    base_url: String,

    /// API key sent as a bearer token on every request
    api_key: String,
}

impl SendGridClient {
    /// Creates a new client from the exporter configuration
    ///
    /// The request timeout mirrors the collector's fetch deadline so a
    /// stalled provider connection is torn down rather than left open.
    pub fn new(config: &ExporterConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .user_agent(concat!("sendgrid-exporter/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(SendGridClient {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// Performs an authenticated GET and decodes the JSON response
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("Requesting {} with {} parameter(s)", url, query.len());

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // Keep a short body excerpt; SendGrid error bodies name the
            // offending parameter and that is what operators need to see.
            let message = response.text().await.unwrap_or_default();
            let message: String = message.chars().take(200).collect();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl StatsProvider for SendGridClient {
    async fn fetch_by_date(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DateStats>, ProviderError> {
        let query = [
            ("start_date", start.format(DATE_FORMAT).to_string()),
            ("end_date", end.format(DATE_FORMAT).to_string()),
            ("aggregated_by", "day".to_string()),
        ];

        let statistics: Vec<DateStats> = self.get_json("stats", &query).await?;
        debug!("Fetched statistics for {} date(s)", statistics.len());

        Ok(statistics)
    }

    async fn fetch_by_category(&self, date: NaiveDate) -> Result<CategoryStats, ProviderError> {
        let day = date.format(DATE_FORMAT).to_string();
        let query = [("start_date", day.clone()), ("end_date", day)];

        // The endpoint reports per-category stats for each date in the
        // range; a single-day query yields exactly one element.
        let mut statistics: Vec<CategoryStats> = self.get_json("categories/stats", &query).await?;
        if statistics.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        let day_stats = statistics.remove(0);
        debug!(
            "Fetched statistics for {} categorie(s) on {}",
            day_stats.stats.len(),
            day_stats.date
        );

        Ok(day_stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: String) -> SendGridClient {
        let config = ExporterConfig {
            user_name: "acme".to_string(),
            api_key: "SG.test-key".to_string(),
            api_base_url: base_url,
            ..ExporterConfig::default()
        };
        SendGridClient::new(&config).expect("client should build")
    }

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn fetch_by_date_sends_window_and_auth() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/stats"))
            .and(query_param("start_date", "2024-03-01"))
            .and(query_param("end_date", "2024-03-15"))
            .and(query_param("aggregated_by", "day"))
            .and(header("authorization", "Bearer SG.test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "date": "2024-03-01",
                    "stats": [ { "metrics": { "delivered": 42, "requests": 50 } } ]
                },
                {
                    "date": "2024-03-02",
                    "stats": [ { "metrics": { "delivered": 7 } } ]
                }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(server.uri());
        let statistics = client
            .fetch_by_date(day("2024-03-01"), day("2024-03-15"))
            .await
            .expect("fetch should succeed");

        assert_eq!(statistics.len(), 2);
        assert_eq!(statistics[0].stats[0].metrics.delivered, 42);
        assert_eq!(statistics[1].stats[0].metrics.delivered, 7);
    }

    #[tokio::test]
    async fn fetch_by_category_maps_names_to_categories() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/categories/stats"))
            .and(query_param("start_date", "2024-03-15"))
            .and(query_param("end_date", "2024-03-15"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "date": "2024-03-15",
                    "stats": [
                        { "name": "newsletter", "metrics": { "delivered": 10 } },
                        { "name": "receipts", "metrics": { "delivered": 20 } }
                    ]
                }
            ])))
            .mount(&server)
            .await;

        let client = test_client(server.uri());
        let statistics = client
            .fetch_by_category(day("2024-03-15"))
            .await
            .expect("fetch should succeed");

        assert_eq!(statistics.stats.len(), 2);
        assert_eq!(statistics.stats[0].category, "newsletter");
        assert_eq!(statistics.stats[1].metrics.delivered, 20);
    }

    #[tokio::test]
    async fn non_success_status_is_an_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/stats"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({ "errors": [ { "message": "authorization required" } ] })),
            )
            .mount(&server)
            .await;

        let client = test_client(server.uri());
        let result = client
            .fetch_by_date(day("2024-03-01"), day("2024-03-15"))
            .await;

        match result {
            Err(ProviderError::Api { status, message }) => {
                assert_eq!(status, 401);
                assert!(message.contains("authorization required"));
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_category_series_is_reported() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/categories/stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = test_client(server.uri());
        let result = client.fetch_by_category(day("2024-03-15")).await;

        assert!(matches!(result, Err(ProviderError::EmptyResponse)));
    }
}
