use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collect::types::{PrState, PullRequestRecord};
use crate::dataset::Table;

/// How the `interactions` feature is computed. The two formulas come from
/// two generations of the dataset and are never mixed in one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionFormula {
    /// comments + review_comments
    CommentsBased,
    /// comments + participants_count
    ParticipantBased,
}

impl std::fmt::Display for InteractionFormula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InteractionFormula::CommentsBased => write!(f, "comments + review_comments"),
            InteractionFormula::ParticipantBased => write!(f, "comments + participants_count"),
        }
    }
}

/// A row of the cleaned table: every raw column plus the derived ones.
///
/// Derived columns are required, so a cleaned table with a blank derived
/// cell fails to load that row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetricsRow {
    pub repo_full_name: String,
    pub id: u64,
    pub number: u64,
    pub title: String,
    #[serde(rename = "user")]
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    pub comments: u64,
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
    pub review_time_h: f64,
    pub size: u64,
    pub interactions: u64,
    pub status_numeric: u8,
}

impl Table for DerivedMetricsRow {
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
        "review_time_h",
        "size",
        "interactions",
        "status_numeric",
    ];
}

/// Values computed from one raw record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedMetrics {
    pub review_time_h: f64,
    pub size: u64,
    pub interactions: u64,
    pub status_numeric: u8,
}

impl DerivedMetricsRow {
    pub fn new(record: PullRequestRecord, metrics: DerivedMetrics) -> Self {
        Self {
            repo_full_name: record.repo_full_name,
            id: record.id,
            number: record.number,
            title: record.title,
            author: record.author,
            created_at: record.created_at,
            closed_at: record.closed_at,
            merged_at: record.merged_at,
            comments: record.comments,
            review_comments: record.review_comments,
            changed_files: record.changed_files,
            additions: record.additions,
            deletions: record.deletions,
            state: record.state,
            merged: record.merged,
            body_length: record.body_length,
            review_count: record.review_count,
            participants_count: record.participants_count,
            review_time_h: metrics.review_time_h,
            size: metrics.size,
            interactions: metrics.interactions,
            status_numeric: metrics.status_numeric,
        }
    }

    /// The raw columns of this row, with derived columns discarded.
    #[cfg(test)]
    pub fn to_record(&self) -> PullRequestRecord {
        PullRequestRecord {
            repo_full_name: self.repo_full_name.clone(),
            id: self.id,
            number: self.number,
            title: self.title.clone(),
            author: self.author.clone(),
            created_at: self.created_at,
            closed_at: self.closed_at,
            merged_at: self.merged_at,
            comments: self.comments,
            review_comments: self.review_comments,
            changed_files: self.changed_files,
            additions: self.additions,
            deletions: self.deletions,
            state: self.state,
            merged: self.merged,
            body_length: self.body_length,
            review_count: self.review_count,
            participants_count: self.participants_count,
        }
    }

    pub fn is_merged(&self) -> bool {
        self.status_numeric == 1
    }
}
