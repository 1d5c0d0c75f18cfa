pub mod types;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::GitHubConfig;
use types::SearchEnvelope;

const USER_AGENT: &str = "pr-review-study";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("GitHub API returned HTTP {status}: {}", github_message(.body))]
    Status { status: u16, body: String },

    #[error("GitHub API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected GitHub API response shape: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Pull the human-readable `message` out of a GitHub error body, falling
/// back to the raw body.
fn github_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("message").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Anything that can answer a GET against the GitHub REST API with JSON.
///
/// The HTTP client is the production implementation; the collectors are
/// written against this trait so they can be driven by canned responses.
#[async_trait]
pub trait ApiSource: Send + Sync {
    async fn get_json(&self, path: &str, query: &[(String, String)]) -> Result<Value, FetchError>;
}

/// Shape of a list response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    /// Bare JSON array.
    List,
    /// `{ "items": [...] }` as returned by search endpoints.
    Search,
}

/// A paginated resource: path, fixed query parameters and page size.
#[derive(Debug, Clone)]
pub struct Endpoint {
    path: String,
    params: Vec<(String, String)>,
    envelope: Envelope,
    per_page: u32,
}

impl Endpoint {
    pub fn list(path: impl Into<String>, per_page: u32) -> Self {
        Self {
            path: path.into(),
            params: Vec::new(),
            envelope: Envelope::List,
            per_page,
        }
    }

    pub fn search(path: impl Into<String>, per_page: u32) -> Self {
        Self {
            envelope: Envelope::Search,
            ..Self::list(path, per_page)
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.push((key.to_string(), value.into()));
        self
    }

    fn page_query(&self, page: u32) -> Vec<(String, String)> {
        let mut query = self.params.clone();
        query.push(("per_page".to_string(), self.per_page.to_string()));
        query.push(("page".to_string(), page.to_string()));
        query
    }
}

/// One page of a list resource.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// False once a page comes back short or empty.
    pub has_more: bool,
}

/// Fetch a single page (1-based) of a list resource.
pub async fn fetch_page<T: DeserializeOwned>(
    source: &dyn ApiSource,
    endpoint: &Endpoint,
    page: u32,
) -> Result<Page<T>, FetchError> {
    let value = source.get_json(&endpoint.path, &endpoint.page_query(page)).await?;
    let items: Vec<T> = match endpoint.envelope {
        Envelope::List => serde_json::from_value(value)?,
        Envelope::Search => serde_json::from_value::<SearchEnvelope<T>>(value)?.items,
    };
    let has_more = !items.is_empty() && items.len() >= endpoint.per_page as usize;
    debug!(path = %endpoint.path, page, items = items.len(), has_more, "fetched page");
    Ok(Page { items, has_more })
}

/// Fetch every page of a resource until a short/empty page or `max_pages`.
///
/// An error on the first page fails the resource. An error on a later page
/// stops paging and keeps the items already fetched.
pub async fn fetch_all<T: DeserializeOwned>(
    source: &dyn ApiSource,
    endpoint: &Endpoint,
    max_pages: Option<u32>,
) -> Result<Vec<T>, FetchError> {
    let mut all = Vec::new();
    let mut page = 1;
    loop {
        let fetched = match fetch_page::<T>(source, endpoint, page).await {
            Ok(fetched) => fetched,
            Err(err) if page == 1 => return Err(err),
            Err(err) => {
                warn!(path = %endpoint.path, page, kept = all.len(), error = %err, "page failed, keeping earlier pages");
                break;
            }
        };
        all.extend(fetched.items);
        if !fetched.has_more || max_pages.is_some_and(|cap| page >= cap) {
            break;
        }
        page += 1;
    }
    Ok(all)
}

/// Fetch a single (non-paginated) resource.
pub async fn fetch_one<T: DeserializeOwned>(
    source: &dyn ApiSource,
    path: &str,
) -> Result<T, FetchError> {
    let value = source.get_json(path, &[]).await?;
    Ok(serde_json::from_value(value)?)
}

/// reqwest-backed GitHub client with a fixed pause after every call.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
    token: Option<String>,
    delay: Duration,
}

impl GitHubClient {
    pub fn new(api_base: impl Into<String>, token: Option<String>, delay: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token,
            delay,
        }
    }

    /// Build from config; the token is resolved by the caller so that no
    /// environment lookups happen below this point.
    pub fn from_config(config: &GitHubConfig, token: Option<String>) -> Self {
        Self::new(config.api_base.clone(), token, config.request_delay())
    }

    async fn send(&self, path: &str, query: &[(String, String)]) -> Result<Value, FetchError> {
        let url = format!("{}{}", self.api_base, path);
        let mut request = self
            .http
            .get(&url)
            .query(query)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl ApiSource for GitHubClient {
    #[instrument(skip(self, query), fields(path = %path))]
    async fn get_json(&self, path: &str, query: &[(String, String)]) -> Result<Value, FetchError> {
        let result = self.send(path, query).await;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        result
    }
}

#[cfg(test)]
pub mod testing {
    use super::{ApiSource, FetchError};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory ApiSource keyed by `path` or `path?page=N`.
    /// Unrouted requests answer 404.
    #[derive(Default)]
    pub struct FakeSource {
        routes: HashMap<String, Result<Value, u16>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_json(mut self, key: &str, value: Value) -> Self {
            self.routes.insert(key.to_string(), Ok(value));
            self
        }

        pub fn with_status(mut self, key: &str, status: u16) -> Self {
            self.routes.insert(key.to_string(), Err(status));
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ApiSource for FakeSource {
        async fn get_json(&self, path: &str, query: &[(String, String)]) -> Result<Value, FetchError> {
            let key = match query.iter().find(|(k, _)| k == "page") {
                Some((_, page)) => format!("{path}?page={page}"),
                None => path.to_string(),
            };
            self.calls.lock().unwrap().push(key.clone());
            match self.routes.get(&key) {
                Some(Ok(value)) => Ok(value.clone()),
                Some(Err(status)) => Err(FetchError::Status {
                    status: *status,
                    body: r#"{"message":"canned failure"}"#.to_string(),
                }),
                None => Err(FetchError::Status {
                    status: 404,
                    body: r#"{"message":"Not Found"}"#.to_string(),
                }),
            }
        }
    }
}
