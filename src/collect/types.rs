use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::dataset::Table;

/// Lifecycle state label of a pull request.
///
/// GitHub itself only reports `open` and `closed`; `merged` appears in
/// datasets that relabel merged pull requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    Open,
    Closed,
    Merged,
}

impl PrState {
    /// Parse an API state label; unknown labels are treated as open.
    pub fn from_api(label: &str) -> Self {
        match label {
            "closed" => PrState::Closed,
            "merged" => PrState::Merged,
            _ => PrState::Open,
        }
    }
}

impl std::fmt::Display for PrState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrState::Open => write!(f, "open"),
            PrState::Closed => write!(f, "closed"),
            PrState::Merged => write!(f, "merged"),
        }
    }
}

/// One row of the raw pull-request table.
///
/// `review_count` and `participants_count` are optional because older
/// raw tables were collected without the sub-resource enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestRecord {
    pub repo_full_name: String,
    pub id: u64,
    pub number: u64,
    pub title: String,
    /// Author login; None for deleted ("ghost") accounts.
    #[serde(rename = "user")]
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    /// Issue-style conversation comments.
    pub comments: u64,
    /// Inline comments on the diff.
    pub review_comments: u64,
    pub changed_files: u64,
    pub additions: u64,
    pub deletions: u64,
    pub state: PrState,
    pub merged: bool,
    pub body_length: u64,
    #[serde(default)]
    pub review_count: Option<u64>,
    #[serde(default)]
    pub participants_count: Option<u64>,
}

impl Table for PullRequestRecord {
    const COLUMNS: &'static [&'static str] = &[
        "repo_full_name",
        "id",
        "number",
        "title",
        "user",
        "created_at",
        "closed_at",
        "merged_at",
        "comments",
        "review_comments",
        "changed_files",
        "additions",
        "deletions",
        "state",
        "merged",
        "body_length",
        "review_count",
        "participants_count",
    ];
}

/// One row of the repository list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub url: String,
    pub stars: u64,
    pub forks: u64,
}

impl Table for RepositoryRecord {
    const COLUMNS: &'static [&'static str] = &["id", "name", "full_name", "url", "stars", "forks"];
}

/// Distinct author logins seen on a single pull request.
#[derive(Debug, Default)]
pub struct ParticipantSet {
    logins: HashSet<String>,
}

impl ParticipantSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an author; absent authors are not participants.
    pub fn add(&mut self, login: Option<&str>) {
        if let Some(login) = login {
            self.logins.insert(login.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.logins.len()
    }
}
