pub mod aggregate;
pub mod discover;
pub mod types;
pub mod walker;

pub use discover::discover_repositories;
pub use types::PullRequestRecord;
pub use walker::collect;

use thiserror::Error;

use crate::config::GitHubConfig;
use crate::github::FetchError;

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("Failed to fetch pull request {repo}#{number}: {source}")]
    Detail {
        repo: String,
        number: u64,
        source: FetchError,
    },
}

/// Paging limits shared by the walker and the aggregator.
#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub per_page: u32,
    /// Pull-request list pages per repository.
    pub max_pages: u32,
    /// Page cap for reviews/comments of one pull request; None pages until
    /// a short page comes back.
    pub sub_resource_max_pages: Option<u32>,
}

impl CollectOptions {
    pub fn from_config(config: &GitHubConfig) -> Self {
        Self {
            per_page: config.per_page,
            max_pages: config.max_pages,
            sub_resource_max_pages: config.sub_resource_max_pages,
        }
    }
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self::from_config(&GitHubConfig::default())
    }
}
