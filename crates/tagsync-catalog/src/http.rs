//! HTTP search transport.
//!
//! # Endpoint Format
//!
//! - POST `{search_url}/ccgf-searchv2/api/v1/search`
//! - Headers: `X-INFA-SEARCH-LANGUAGE: elasticsearch`, `X-INFA-ORG-ID`, `Authorization: Bearer <jwt>`
//! - Request: a [`QueryDocument`] rendered as Elasticsearch JSON
//! - Response: `{"hits": {"totalHits": 123, "hits": [{"sourceAsMap": {...}}, ...]}}`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

#[cfg(feature = "rate-limit")]
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
#[cfg(feature = "rate-limit")]
use std::num::NonZeroU32;
#[cfg(feature = "rate-limit")]
use std::sync::Arc;

use tagsync_config::CatalogConfig;

use crate::auth::Credentials;
use crate::error::{CatalogError, Result};
use crate::filter::QueryDocument;
use crate::search::{SearchBackend, SearchHit, SearchResponse};

/// Base delay for exponential backoff (milliseconds)
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Default requests per second limit
#[cfg(feature = "rate-limit")]
const DEFAULT_REQUESTS_PER_SECOND: u32 = 10;

#[cfg(feature = "rate-limit")]
type SearchRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Transport settings.
#[derive(Debug, Clone)]
pub struct HttpSearchConfig {
    /// Search service base URL
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum retry attempts for transient failures
    pub max_retries: u32,
    /// Requests per second limit (when rate-limit feature enabled)
    #[cfg(feature = "rate-limit")]
    pub requests_per_second: u32,
}

impl HttpSearchConfig {
    pub fn from_catalog(catalog: &CatalogConfig) -> Self {
        Self {
            base_url: catalog.search_url(),
            timeout_secs: catalog.timeout_secs,
            max_retries: catalog.max_retries,
            #[cfg(feature = "rate-limit")]
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    hits: Option<WireHits>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireHits {
    #[serde(default)]
    total_hits: u64,
    #[serde(default)]
    hits: Vec<WireHit>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireHit {
    #[serde(default)]
    source_as_map: Map<String, Value>,
}

impl TryFrom<WireResponse> for SearchResponse {
    type Error = CatalogError;

    fn try_from(wire: WireResponse) -> Result<Self> {
        let hits = wire
            .hits
            .ok_or_else(|| CatalogError::MalformedResponse("missing 'hits' object".into()))?;
        Ok(SearchResponse {
            total_hits: hits.total_hits,
            hits: hits
                .hits
                .into_iter()
                .map(|h| SearchHit::new(h.source_as_map))
                .collect(),
        })
    }
}

/// Search backend over the catalog's HTTP search API.
pub struct HttpSearchBackend {
    client: Client,
    config: HttpSearchConfig,
    credentials: Credentials,
    #[cfg(feature = "rate-limit")]
    rate_limiter: Arc<SearchRateLimiter>,
}

impl HttpSearchBackend {
    pub fn new(config: HttpSearchConfig, credentials: Credentials) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CatalogError::InvalidConfig(format!("HTTP client error: {}", e)))?;

        #[cfg(feature = "rate-limit")]
        let rate_limiter = {
            let rps = NonZeroU32::new(config.requests_per_second)
                .or(NonZeroU32::new(DEFAULT_REQUESTS_PER_SECOND))
                .unwrap_or(NonZeroU32::MIN);
            Arc::new(RateLimiter::direct(Quota::per_second(rps)))
        };

        Ok(Self {
            client,
            config,
            credentials,
            #[cfg(feature = "rate-limit")]
            rate_limiter,
        })
    }

    #[cfg(feature = "rate-limit")]
    async fn wait_for_permit(&self) {
        self.rate_limiter.until_ready().await;
    }

    #[cfg(not(feature = "rate-limit"))]
    async fn wait_for_permit(&self) {}

    fn search_url(&self) -> String {
        format!(
            "{}/ccgf-searchv2/api/v1/search",
            self.config.base_url.trim_end_matches('/')
        )
    }

    /// Send with exponential backoff on transient failures.
    async fn request_with_retry(&self, query: &QueryDocument) -> Result<SearchResponse> {
        let mut retry_delay = Duration::from_millis(RETRY_BASE_DELAY_MS);
        let mut attempt = 0;

        loop {
            self.wait_for_permit().await;

            match self.send_request(query).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(
                        "Search request failed ({}), retry {}/{} in {:?}",
                        e, attempt, self.config.max_retries, retry_delay
                    );
                    tokio::time::sleep(retry_delay).await;
                    retry_delay *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_request(&self, query: &QueryDocument) -> Result<SearchResponse> {
        let url = self.search_url();
        debug!("POST {} from={} size={}", url, query.from, query.size);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("X-INFA-SEARCH-LANGUAGE", "elasticsearch")
            .header("X-INFA-ORG-ID", &self.credentials.org_id)
            .header("Authorization", format!("Bearer {}", self.credentials.jwt))
            .json(query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CatalogError::Connection("Request timed out".into())
                } else if e.is_connect() {
                    CatalogError::Connection(format!("Connection failed: {}", e))
                } else {
                    CatalogError::Connection(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        match status {
            StatusCode::OK => {
                let wire: WireResponse = response.json().await.map_err(|e| {
                    CatalogError::MalformedResponse(format!("Invalid response: {}", e))
                })?;
                wire.try_into()
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok());
                Err(CatalogError::RateLimited { retry_after })
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(CatalogError::from_status(status.as_u16(), body))
            }
        }
    }
}

#[async_trait]
impl SearchBackend for HttpSearchBackend {
    async fn execute(&self, query: &QueryDocument) -> Result<SearchResponse> {
        self.request_with_retry(query).await
    }
}

impl std::fmt::Debug for HttpSearchBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSearchBackend")
            .field("base_url", &self.config.base_url)
            .field("timeout_secs", &self.config.timeout_secs)
            .field("max_retries", &self.config.max_retries)
            .field("org_id", &self.credentials.org_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{equality_filter, fields};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> Credentials {
        Credentials {
            session_id: "sess".into(),
            org_id: "org-1".into(),
            jwt: "jwt-1".into(),
        }
    }

    fn test_config(server: &MockServer) -> HttpSearchConfig {
        HttpSearchConfig {
            base_url: server.uri(),
            timeout_secs: 5,
            max_retries: 1,
            #[cfg(feature = "rate-limit")]
            requests_per_second: 100,
        }
    }

    fn count_query() -> QueryDocument {
        QueryDocument::count(vec![equality_filter(fields::ORIGIN, "origin-1")])
    }

    #[tokio::test]
    async fn test_execute_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/ccgf-searchv2/api/v1/search"))
            .and(header("X-INFA-SEARCH-LANGUAGE", "elasticsearch"))
            .and(header("X-INFA-ORG-ID", "org-1"))
            .and(header("Authorization", "Bearer jwt-1"))
            .and(body_json(count_query().to_json()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": {
                    "totalHits": 2,
                    "hits": [
                        {"sourceAsMap": {"core.identity": "a", "elementType": "OBJECT"}},
                        {"sourceAsMap": {"core.identity": "b", "elementType": "OBJECT"}}
                    ]
                }
            })))
            .mount(&server)
            .await;

        let backend = HttpSearchBackend::new(test_config(&server), credentials()).unwrap();
        let response = backend.execute(&count_query()).await.unwrap();

        assert_eq!(response.total_hits, 2);
        assert_eq!(response.hits.len(), 2);
        assert_eq!(response.hits[1].identity(), Some("b"));
    }

    #[tokio::test]
    async fn test_malformed_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/ccgf-searchv2/api/v1/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "nope"})))
            .mount(&server)
            .await;

        let backend = HttpSearchBackend::new(test_config(&server), credentials()).unwrap();
        let result = backend.execute(&count_query()).await;

        assert!(matches!(result, Err(CatalogError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_unauthorized_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/ccgf-searchv2/api/v1/search"))
            .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
            .expect(1)
            .mount(&server)
            .await;

        let backend = HttpSearchBackend::new(test_config(&server), credentials()).unwrap();
        let result = backend.execute(&count_query()).await;

        assert!(matches!(
            result,
            Err(CatalogError::Unauthorized { status: 401, .. })
        ));
    }

    #[tokio::test]
    async fn test_bad_request_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/ccgf-searchv2/api/v1/search"))
            .respond_with(ResponseTemplate::new(400).set_body_string("parse error"))
            .expect(1)
            .mount(&server)
            .await;

        let backend = HttpSearchBackend::new(test_config(&server), credentials()).unwrap();
        let result = backend.execute(&count_query()).await;

        assert!(matches!(result, Err(CatalogError::Rejected { status: 400, .. })));
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/ccgf-searchv2/api/v1/search"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/ccgf-searchv2/api/v1/search"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"hits": {"totalHits": 7, "hits": []}})),
            )
            .mount(&server)
            .await;

        let backend = HttpSearchBackend::new(test_config(&server), credentials()).unwrap();
        let response = backend.execute(&count_query()).await.unwrap();

        assert_eq!(response.total_hits, 7);
    }

    #[tokio::test]
    async fn test_rate_limit_exhausts_retries() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/ccgf-searchv2/api/v1/search"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("Retry-After", "60")
                    .set_body_string("slow down"),
            )
            .expect(2)
            .mount(&server)
            .await;

        let backend = HttpSearchBackend::new(test_config(&server), credentials()).unwrap();
        let result = backend.execute(&count_query()).await;

        match result {
            Err(CatalogError::RateLimited { retry_after }) => assert_eq!(retry_after, Some(60)),
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn test_config_from_catalog() {
        let catalog = CatalogConfig {
            pod: "dmp-us".into(),
            max_retries: 5,
            ..Default::default()
        };
        let config = HttpSearchConfig::from_catalog(&catalog);
        assert_eq!(config.base_url, "https://cdgc-api.dmp-us.informaticacloud.com");
        assert_eq!(config.max_retries, 5);
    }
}
