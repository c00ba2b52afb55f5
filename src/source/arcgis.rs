//! ArcGIS FeatureServer query client.

use crate::error::FetchError;
use crate::models::FeaturePage;
use crate::source::{FeatureSource, PageQuery};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

/// Irish planning applications layer.
pub const DEFAULT_QUERY_URL: &str = "https://services.arcgis.com/NzlPQPKn5QF9v2US/ArcGIS/rest/services/IrishPlanningApplications/FeatureServer/0/query";

/// Feature source backed by a FeatureServer `/query` endpoint.
pub struct ArcGisClient {
    http_client: reqwest::Client,
    query_url: String,
}

impl ArcGisClient {
    pub fn new(query_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("planstats/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            query_url: query_url.into(),
        })
    }

    pub fn query_url(&self) -> &str {
        &self.query_url
    }
}

#[async_trait]
impl FeatureSource for ArcGisClient {
    async fn query(&self, query: &PageQuery) -> Result<FeaturePage, FetchError> {
        debug!(
            "GET {} offset={} limit={}",
            self.query_url, query.offset, query.limit
        );

        let response = self
            .http_client
            .get(&self.query_url)
            .query(&query.to_params())
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        decode_page(&body)
    }
}

/// Decodes a response body, promoting embedded service errors.
pub(crate) fn decode_page(body: &str) -> Result<FeaturePage, FetchError> {
    let page: FeaturePage =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;

    match page.error {
        Some(ref err) if err.code == 429 => Err(FetchError::RateLimited),
        Some(err) => Err(FetchError::Service {
            code: err.code,
            message: err.message,
        }),
        None => Ok(page),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_page() {
        let body = r#"{"features":[{"attributes":{"OBJECTID":1},"geometry":{"x":1.5,"y":2.5}}]}"#;
        let page = decode_page(body).unwrap();
        assert_eq!(page.features.len(), 1);
        assert_eq!(page.features[0].attributes["OBJECTID"], 1);
    }

    #[test]
    fn test_decode_empty_page() {
        let page = decode_page(r#"{"features":[]}"#).unwrap();
        assert!(page.features.is_empty());
    }

    #[test]
    fn test_decode_embedded_rate_limit() {
        let body = r#"{"error":{"code":429,"message":"Too many requests"}}"#;
        assert_eq!(decode_page(body).unwrap_err(), FetchError::RateLimited);
    }

    #[test]
    fn test_decode_embedded_service_error() {
        let body = r#"{"error":{"code":400,"message":"Unable to complete operation."}}"#;
        assert_eq!(
            decode_page(body).unwrap_err(),
            FetchError::Service {
                code: 400,
                message: "Unable to complete operation.".to_string()
            }
        );
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(
            decode_page("<html>gateway</html>"),
            Err(FetchError::Decode(_))
        ));
    }

    #[test]
    fn test_client_keeps_url() {
        let client = ArcGisClient::new(DEFAULT_QUERY_URL, Duration::from_secs(5)).unwrap();
        assert!(client.query_url().ends_with("/FeatureServer/0/query"));
    }
}
