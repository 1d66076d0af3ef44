//! SerpAPI Google Scholar client.
//!
//! Issues one search request per call and turns the `organic_results`
//! array of the JSON payload into [`SearchResult`] records.
//!
//! The payload is treated as untrusted: missing keys, `null`s and values of
//! the wrong JSON type all read as "absent" rather than failing the request.

use crate::config::{Config, RetryPolicy};
use crate::error::{FetchError, Result, ScholarError};
use reqwest::StatusCode;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// SerpAPI engine used for every request
pub const ENGINE: &str = "google_scholar";

/// Longest wait between retries
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// User agent string for requests
const USER_AGENT: &str = concat!("scholarcsv/", env!("CARGO_PKG_VERSION"));

/// A validated search request.
///
/// Created once per run and never modified.
#[derive(Clone)]
pub struct SearchRequest {
    query: String,
    result_count: u32,
    api_key: String,
}

impl SearchRequest {
    /// Validate and build a request.
    ///
    /// # Errors
    ///
    /// Returns `ScholarError::Config` if the query or key is blank, or if
    /// `result_count` is zero.
    pub fn new(query: &str, result_count: u32, api_key: &str) -> Result<Self> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ScholarError::Config("search query is empty".to_string()));
        }
        if result_count == 0 {
            return Err(ScholarError::Config(
                "result count must be a positive integer".to_string(),
            ));
        }
        if api_key.trim().is_empty() {
            return Err(ScholarError::Config("SerpAPI key is empty".to_string()));
        }

        Ok(Self {
            query: query.to_string(),
            result_count,
            api_key: api_key.trim().to_string(),
        })
    }

    /// Trimmed query text
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Upper bound on returned results
    pub fn result_count(&self) -> u32 {
        self.result_count
    }
}

impl std::fmt::Debug for SearchRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchRequest")
            .field("query", &self.query)
            .field("result_count", &self.result_count)
            .finish_non_exhaustive()
    }
}

/// One entry of `organic_results`.
///
/// Every field is optional; use the accessors, which supply defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResult {
    /// Ranking position reported by the service.
    ///
    /// Only logged; CSV rows are numbered by their order in the response.
    pub position: Option<u32>,
    /// Article title
    pub title: Option<String>,
    /// Author names from `publication_info.authors`
    pub authors: Option<Vec<String>>,
    /// Link to the article
    pub link: Option<String>,
    /// Text snippet
    pub snippet: Option<String>,
    /// `publication_info.summary`, e.g. "A Author - Journal, 2020 - host"
    pub publication: Option<String>,
}

impl SearchResult {
    /// Extract a result from one JSON entry.
    ///
    /// Returns `None` when the entry is not a JSON object.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let publication_info = obj.get("publication_info").and_then(Value::as_object);

        Some(Self {
            position: obj
                .get("position")
                .and_then(Value::as_u64)
                .and_then(|p| u32::try_from(p).ok()),
            title: string_field(obj, "title"),
            authors: publication_info.and_then(author_names),
            link: string_field(obj, "link"),
            snippet: string_field(obj, "snippet"),
            publication: publication_info.and_then(|info| string_field(info, "summary")),
        })
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or_default()
    }

    pub fn authors(&self) -> &[String] {
        self.authors.as_deref().unwrap_or_default()
    }

    pub fn link(&self) -> &str {
        self.link.as_deref().unwrap_or_default()
    }

    pub fn snippet(&self) -> &str {
        self.snippet.as_deref().unwrap_or_default()
    }

    pub fn publication(&self) -> &str {
        self.publication.as_deref().unwrap_or_default()
    }
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Names from `publication_info.authors`, accepting `{"name": ..}` objects
/// or bare strings. Entries without a usable name are dropped.
fn author_names(info: &Map<String, Value>) -> Option<Vec<String>> {
    let authors = info.get("authors")?.as_array()?;
    Some(
        authors
            .iter()
            .filter_map(|author| match author {
                Value::String(name) => Some(name.as_str()),
                Value::Object(obj) => obj.get("name").and_then(Value::as_str),
                _ => None,
            })
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

/// SerpAPI client bound to one endpoint.
pub struct SerpApiClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl SerpApiClient {
    /// Create a client for `endpoint`.
    ///
    /// No request timeout is configured; the transport defaults apply.
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            ScholarError::Config(format!("Invalid endpoint URL '{}': {}", endpoint, e))
        })?;

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ScholarError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, endpoint })
    }

    /// Create a client for the configured endpoint
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.endpoint)
    }

    fn build_search_url(&self, request: &SearchRequest) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("engine", ENGINE)
            .append_pair("q", &request.query)
            .append_pair("num", &request.result_count.to_string())
            .append_pair("api_key", &request.api_key);
        url
    }

    /// Run one search request.
    ///
    /// Exactly one HTTP GET is issued; failures are not retried.
    ///
    /// # Errors
    ///
    /// * `FetchError::Auth` for HTTP 401/403
    /// * `FetchError::Network` for transport failures and other non-2xx statuses
    /// * `FetchError::Parse` when the body is not a readable JSON payload
    pub async fn fetch(
        &self,
        request: &SearchRequest,
    ) -> std::result::Result<Vec<SearchResult>, FetchError> {
        info!(
            query = %request.query,
            num = request.result_count,
            endpoint = %self.endpoint,
            "Searching Google Scholar via SerpAPI"
        );

        let url = self.build_search_url(request);
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), bytes = body.len(), "Response received");

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Auth {
                status: status.as_u16(),
                message: error_message(&body).unwrap_or_else(|| status.to_string()),
            });
        }

        if !status.is_success() {
            let detail = error_message(&body).unwrap_or_default();
            warn!(status = status.as_u16(), error = %detail, "Search service error");
            return Err(FetchError::Network(format!("HTTP {}: {}", status, detail)));
        }

        let results = parse_response(&body, request.result_count)?;
        info!(count = results.len(), "Search complete");
        Ok(results)
    }

    /// Run [`fetch`](Self::fetch), retrying transient failures per `policy`.
    ///
    /// With the default policy this is a single attempt. Only
    /// `FetchError::Network` is retried.
    pub async fn fetch_with_retry(
        &self,
        request: &SearchRequest,
        policy: &RetryPolicy,
    ) -> std::result::Result<Vec<SearchResult>, FetchError> {
        let mut backoff = policy.initial_backoff;
        let mut attempt = 0;

        loop {
            match self.fetch(request).await {
                Err(e) if e.is_transient() && attempt < policy.max_retries => {
                    attempt += 1;
                    let jitter = Duration::from_millis(rand::random::<u64>() % 250);
                    let wait = backoff + jitter;
                    warn!(
                        attempt = attempt,
                        max_retries = policy.max_retries,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "Search failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    backoff = next_backoff(backoff);
                }
                other => return other,
            }
        }
    }
}

/// Double `current`, capped at [`MAX_BACKOFF`].
fn next_backoff(current: Duration) -> Duration {
    current.saturating_mul(2).min(MAX_BACKOFF)
}

/// Parse a SerpAPI JSON body into at most `limit` results.
///
/// A missing `organic_results` key means zero results.
pub fn parse_response(
    body: &str,
    limit: u32,
) -> std::result::Result<Vec<SearchResult>, FetchError> {
    let payload: Value = serde_json::from_str(body)?;
    let payload = payload
        .as_object()
        .ok_or_else(|| FetchError::Parse("expected a JSON object".to_string()))?;

    let entries = match payload.get("organic_results") {
        None | Some(Value::Null) => {
            match payload.get("error").and_then(Value::as_str) {
                Some(message) => info!(message = message, "Service reported no results"),
                None => debug!("Response has no organic_results"),
            }
            return Ok(Vec::new());
        }
        Some(Value::Array(entries)) => entries,
        Some(_) => {
            return Err(FetchError::Parse(
                "organic_results is not an array".to_string(),
            ))
        }
    };

    let mut results = Vec::with_capacity(entries.len().min(limit as usize));
    for (idx, entry) in entries.iter().enumerate() {
        if results.len() >= limit as usize {
            debug!(dropped = entries.len() - idx, "Truncated to requested count");
            break;
        }
        match SearchResult::from_value(entry) {
            Some(result) => {
                debug!(index = idx, position = ?result.position, title = result.title(), "Result");
                results.push(result);
            }
            None => warn!(index = idx, "Skipping malformed result entry"),
        }
    }

    Ok(results)
}

/// The `error` string of a JSON error body, if any.
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()?
        .get("error")?
        .as_str()
        .map(str::to_string)
}
