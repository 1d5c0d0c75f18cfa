use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Account reference embedded in most GitHub payloads.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub login: String,
}

/// One entry of the pull-request list endpoint. Only the number is used;
/// everything else is read from the detail endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct PullSummary {
    pub number: u64,
}

/// Response of GET /repos/{owner}/{repo}/pulls/{number}.
///
/// Count fields are only present on the detail endpoint, so they default
/// to zero when a payload omits them.
#[derive(Debug, Clone, Deserialize)]
pub struct PullDetail {
    pub id: u64,
    pub number: u64,
    pub title: String,
    pub user: Option<User>,
    pub body: Option<String>,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub merged: bool,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub review_comments: u64,
    #[serde(default)]
    pub changed_files: u64,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
}

/// Search endpoints wrap their results as `{ "items": [...] }`.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchEnvelope<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

/// Repository entry from /search/repositories.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryItem {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub html_url: String,
    pub stargazers_count: u64,
    pub forks_count: u64,
}
