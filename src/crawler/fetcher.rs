//! Notion REST transport
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with timeouts and compression
//! - Authenticated JSON requests against the Notion API
//! - Cursor pagination for block children, database queries and users
//! - Retry logic for transient failures
//! - Error classification

use crate::config::ApiConfig;
use crate::crawler::source::ContentSource;
use crate::model::RawObject;
use crate::{ConfigError, FetchError};
use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;

/// Page size requested from every paginated endpoint (the API maximum)
const PAGE_SIZE: u32 = 100;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The API configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use notion_harvest::config::ApiConfig;
/// use notion_harvest::crawler::build_http_client;
///
/// let client = build_http_client(&ApiConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &ApiConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// `ContentSource` backed by the Notion REST API
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 401 | Immediate → Unauthorized (aborts the crawl) |
/// | HTTP 403 | Immediate → Forbidden |
/// | HTTP 404 | Immediate → NotFound |
/// | Other 4xx | Immediate → Rejected |
/// | HTTP 429 | Wait `Retry-After` seconds, retry |
/// | HTTP 5xx | Wait `retry-delay-ms`, retry |
/// | Timeout / connection error | Wait `retry-delay-ms`, retry |
/// | Unparsable body | Wait `retry-delay-ms`, retry |
///
/// After `max-retries` attempts the request fails with `RetryExhausted`.
#[derive(Clone)]
pub struct NotionClient {
    client: Client,
    base_url: String,
    token: String,
    notion_version: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl NotionClient {
    /// Creates a client for the given configuration and token
    pub fn new(config: &ApiConfig, token: impl Into<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            notion_version: config.notion_version.clone(),
            max_retries: config.max_retries.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    /// Creates a client using the token from the config or `NOTION_TOKEN`
    pub fn from_config(config: &ApiConfig) -> Result<Self, crate::HarvestError> {
        let token = config.resolve_token().ok_or(ConfigError::MissingToken)?;
        Ok(Self::new(config, token)?)
    }

    fn api_request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .header("Notion-Version", &self.notion_version)
            .header(header::ACCEPT, "application/json")
    }

    /// Sends a request built by `build` until it succeeds or fails for good
    async fn execute<T, B, P>(&self, what: &str, build: B, parse: P) -> Result<T, FetchError>
    where
        B: Fn() -> RequestBuilder,
        P: Fn(&[u8]) -> Result<T, String>,
    {
        let mut last_error = String::new();

        for attempt in 1..=self.max_retries {
            let wait = match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        match response.bytes().await {
                            Ok(body) => match parse(&body) {
                                Ok(value) => return Ok(value),
                                Err(e) => {
                                    last_error = format!("unparsable response: {}", e);
                                    self.retry_delay
                                }
                            },
                            Err(e) => {
                                last_error = e.to_string();
                                self.retry_delay
                            }
                        }
                    } else if status == StatusCode::TOO_MANY_REQUESTS {
                        last_error = "rate limited (HTTP 429)".to_string();
                        retry_after(&response).unwrap_or(self.retry_delay)
                    } else if status.is_server_error() {
                        last_error = format!("HTTP {}", status.as_u16());
                        self.retry_delay
                    } else {
                        let body = response.text().await.unwrap_or_default();
                        return Err(classify_rejection(status, &body));
                    }
                }
                Err(e) => {
                    last_error = if e.is_timeout() {
                        "request timeout".to_string()
                    } else if e.is_connect() {
                        format!("connection failed: {}", e)
                    } else {
                        e.to_string()
                    };
                    self.retry_delay
                }
            };

            if attempt < self.max_retries {
                tracing::debug!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    what,
                    attempt,
                    self.max_retries,
                    last_error,
                    wait
                );
                tokio::time::sleep(wait).await;
            }
        }

        Err(FetchError::RetryExhausted {
            attempts: self.max_retries,
            last_error,
        })
    }

    async fn get_json(&self, path: &str) -> Result<Value, FetchError> {
        self.execute(
            path,
            || self.api_request(reqwest::Method::GET, path),
            parse_json,
        )
        .await
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, FetchError> {
        self.execute(
            path,
            || self.api_request(reqwest::Method::POST, path).json(body),
            parse_json,
        )
        .await
    }

    /// Collects every `results` entry of a paginated GET endpoint
    async fn get_all(&self, path: &str) -> Result<Vec<Value>, FetchError> {
        let mut results = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut url = format!("{}?page_size={}", path, PAGE_SIZE);
            if let Some(c) = &cursor {
                url.push_str("&start_cursor=");
                url.push_str(&urlencoding::encode(c));
            }

            let page = self.get_json(&url).await?;
            cursor = collect_page(&page, &mut results)?;
            if cursor.is_none() {
                return Ok(results);
            }
        }
    }

    /// Collects every row of a database query
    async fn query_all(&self, database_id: &str) -> Result<Vec<Value>, FetchError> {
        let path = format!("/databases/{}/query", database_id);
        let mut results = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let body = match &cursor {
                Some(c) => json!({ "page_size": PAGE_SIZE, "start_cursor": c }),
                None => json!({ "page_size": PAGE_SIZE }),
            };

            let page = self.post_json(&path, &body).await?;
            cursor = collect_page(&page, &mut results)?;
            if cursor.is_none() {
                return Ok(results);
            }
        }
    }

    async fn block_children(&self, block_id: &str) -> Result<Vec<Value>, FetchError> {
        self.get_all(&format!("/blocks/{}/children", block_id)).await
    }
}

#[async_trait]
impl ContentSource for NotionClient {
    async fn fetch_page(&self, id: &str) -> Result<RawObject, FetchError> {
        let record = self.get_json(&format!("/pages/{}", id)).await?;
        let blocks = self.block_children(id).await?;

        let mut raw = RawObject::page(id, record);
        let mut queue: VecDeque<String> = expandable(&blocks).collect();
        let mut expanded = HashSet::new();
        raw.blocks = blocks;

        // Breadth-first over nested blocks; sub-pages are separate objects
        while let Some(block_id) = queue.pop_front() {
            if !expanded.insert(block_id.clone()) {
                continue;
            }
            let children = match self.block_children(&block_id).await {
                Ok(children) => children,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        "Children of block {} in page {} unavailable: {}",
                        block_id,
                        id,
                        e
                    );
                    raw.unreadable.insert(block_id, e);
                    continue;
                }
            };
            queue.extend(expandable(&children));
            raw.children.insert(block_id, children);
        }

        tracing::trace!(
            "Fetched page {} ({} top-level blocks, {} nested groups, {} unreadable)",
            id,
            raw.blocks.len(),
            raw.children.len(),
            raw.unreadable.len()
        );
        Ok(raw)
    }

    async fn fetch_database(&self, id: &str) -> Result<RawObject, FetchError> {
        let record = self.get_json(&format!("/databases/{}", id)).await?;
        let rows = self.query_all(id).await?;
        tracing::trace!("Fetched database {} ({} rows)", id, rows.len());
        Ok(RawObject::database(id, record).with_rows(rows))
    }

    async fn list_users(&self) -> Result<Vec<(String, String)>, FetchError> {
        let users = self.get_all("/users").await?;
        Ok(users
            .iter()
            .filter_map(|u| {
                let id = u["id"].as_str()?;
                let name = u["name"].as_str()?;
                Some((id.to_string(), name.to_string()))
            })
            .collect())
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        // Hosted file URLs are pre-signed; sending credentials would break them
        self.execute(url, || self.client.get(url), |body| Ok(body.to_vec()))
            .await
    }
}

fn parse_json(body: &[u8]) -> Result<Value, String> {
    serde_json::from_slice(body).map_err(|e| e.to_string())
}

/// Appends a page's `results` and returns the next cursor, if any
fn collect_page(page: &Value, results: &mut Vec<Value>) -> Result<Option<String>, FetchError> {
    let items = page["results"]
        .as_array()
        .ok_or_else(|| FetchError::Malformed("list response without results".to_string()))?;
    results.extend(items.iter().cloned());

    if page["has_more"].as_bool().unwrap_or(false) {
        match page["next_cursor"].as_str() {
            Some(cursor) => Ok(Some(cursor.to_string())),
            None => Err(FetchError::Malformed(
                "has_more set without next_cursor".to_string(),
            )),
        }
    } else {
        Ok(None)
    }
}

/// Ids of blocks whose children belong to the same page
fn expandable(blocks: &[Value]) -> impl Iterator<Item = String> + '_ {
    blocks.iter().filter_map(|b| {
        let has_children = b["has_children"].as_bool().unwrap_or(false);
        let own_object = matches!(b["type"].as_str(), Some("child_page" | "child_database"));
        if has_children && !own_object {
            b["id"].as_str().map(str::to_string)
        } else {
            None
        }
    })
}

fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Maps a non-retryable HTTP status to a fetch error
fn classify_rejection(status: StatusCode, body: &str) -> FetchError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect());

    match status {
        StatusCode::UNAUTHORIZED => FetchError::Unauthorized(message),
        StatusCode::FORBIDDEN => FetchError::Forbidden,
        StatusCode::NOT_FOUND => FetchError::NotFound,
        _ => FetchError::Rejected {
            status: status.as_u16(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> NotionClient {
        let config = ApiConfig {
            base_url: server.uri(),
            max_retries: 3,
            retry_delay_ms: 5,
            ..ApiConfig::default()
        };
        NotionClient::new(&config, "secret_test").unwrap()
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&ApiConfig::default()).is_ok());
    }

    #[test]
    fn test_classify_rejection() {
        let body = json!({
            "object": "error",
            "status": 401,
            "code": "unauthorized",
            "message": "API token is invalid."
        })
        .to_string();
        assert_eq!(
            classify_rejection(StatusCode::UNAUTHORIZED, &body),
            FetchError::Unauthorized("API token is invalid.".to_string())
        );
        assert_eq!(classify_rejection(StatusCode::NOT_FOUND, ""), FetchError::NotFound);
        assert_eq!(classify_rejection(StatusCode::FORBIDDEN, ""), FetchError::Forbidden);
        assert!(matches!(
            classify_rejection(StatusCode::BAD_REQUEST, "nope"),
            FetchError::Rejected { status: 400, .. }
        ));
    }

    #[test]
    fn test_expandable_skips_sub_objects() {
        let blocks = vec![
            json!({"id": "a", "type": "toggle", "has_children": true}),
            json!({"id": "b", "type": "child_page", "has_children": true}),
            json!({"id": "c", "type": "paragraph", "has_children": false}),
        ];
        assert_eq!(expandable(&blocks).collect::<Vec<_>>(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_sends_auth_and_version_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pages/p1"))
            .and(header("authorization", "Bearer secret_test"))
            .and(header("notion-version", "2022-06-28"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "p1"})))
            .expect(1)
            .mount(&server)
            .await;

        let value = client_for(&server).get_json("/pages/p1").await.unwrap();
        assert_eq!(value["id"], "p1");
    }

    #[tokio::test]
    async fn test_pagination_follows_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blocks/p1/children"))
            .and(query_param("start_cursor", "next-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"id": "b2"}], "has_more": false, "next_cursor": null
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/blocks/p1/children"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"id": "b1"}], "has_more": true, "next_cursor": "next-1"
            })))
            .mount(&server)
            .await;

        let blocks = client_for(&server).block_children("p1").await.unwrap();
        let ids: Vec<_> = blocks.iter().map(|b| b["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["b1", "b2"]);
    }

    #[tokio::test]
    async fn test_database_query_pagination() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/databases/db/query"))
            .and(body_json(json!({"page_size": 100, "start_cursor": "c2"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"id": "r2"}], "has_more": false
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/databases/db/query"))
            .and(body_json(json!({"page_size": 100})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"id": "r1"}], "has_more": true, "next_cursor": "c2"
            })))
            .mount(&server)
            .await;

        let rows = client_for(&server).query_all("db").await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_server_errors_exhaust_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pages/p1"))
            .respond_with(ResponseTemplate::new(502))
            .expect(3)
            .mount(&server)
            .await;

        let err = client_for(&server).get_json("/pages/p1").await.unwrap_err();
        assert!(matches!(err, FetchError::RetryExhausted { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pages/p1"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "object": "error",
                "status": 404,
                "code": "object_not_found",
                "message": "Could not find page"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server).get_json("/pages/p1").await.unwrap_err();
        assert_eq!(err, FetchError::NotFound);
    }

    #[tokio::test]
    async fn test_download_sends_no_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/a.txt"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/a.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello".to_vec()))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let bytes = client
            .download(&format!("{}/files/a.txt?sig=1", server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes, b"hello");
    }

    async fn mount_page_with_synced_block(server: &MockServer, synced_status: u16) {
        Mock::given(method("GET"))
            .and(path("/pages/p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "p1"})))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/blocks/p1/children"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {"id": "b1", "type": "paragraph", "has_children": false},
                    {"id": "s1", "type": "synced_block", "has_children": true}
                ],
                "has_more": false
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/blocks/s1/children"))
            .respond_with(ResponseTemplate::new(synced_status).set_body_json(json!({
                "object": "error",
                "status": synced_status,
                "message": "Could not find block"
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_unreadable_nested_children_keep_the_page() {
        let server = MockServer::start().await;
        mount_page_with_synced_block(&server, 404).await;

        let raw = client_for(&server).fetch_page("p1").await.unwrap();

        assert_eq!(raw.blocks.len(), 2);
        assert!(raw.children.is_empty());
        assert_eq!(raw.unreadable.get("s1"), Some(&FetchError::NotFound));
    }

    #[tokio::test]
    async fn test_unauthorized_nested_children_fail_the_page() {
        let server = MockServer::start().await;
        mount_page_with_synced_block(&server, 401).await;

        let err = client_for(&server).fetch_page("p1").await.unwrap_err();
        assert!(matches!(err, FetchError::Unauthorized(_)));
    }
}
