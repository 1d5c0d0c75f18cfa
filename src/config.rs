use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::collect::types::PrState;
use crate::derive::InteractionFormula;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

const DEFAULT_CONFIG_FILE: &str = ".pr-review-study.toml";

/// Largest page size the GitHub REST API honours.
pub const MAX_PER_PAGE: u32 = 100;

/// Top-level configuration loaded from .pr-review-study.toml.
///
/// Every section is optional; the tool runs with zero config against the
/// public GitHub API (anonymously, unless GITHUB_TOKEN is set).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub derive: DeriveConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// GitHub API token. If None, falls back to GITHUB_TOKEN env var.
    pub token: Option<String>,
    /// Base URL of the REST API, without trailing slash.
    pub api_base: String,
    /// Page size for every list endpoint (GitHub caps this at 100).
    pub per_page: u32,
    /// Pause after each request to stay under the rate limit.
    pub request_delay_ms: u64,
    /// Pull-request list pages fetched per repository.
    pub max_pages: u32,
    /// Page cap for reviews and comments of one pull request. None pages
    /// until a short page; 1 fetches a single page.
    pub sub_resource_max_pages: Option<u32>,
    /// Repositories taken from the head of the repository list.
    pub max_repos: usize,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base: "https://api.github.com".to_string(),
            per_page: 100,
            request_delay_ms: 250,
            max_pages: 2,
            sub_resource_max_pages: None,
            max_repos: 5,
        }
    }
}

impl GitHubConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    /// Keep `per_page` inside what the API returns. A larger value would
    /// make every full page look short and end pagination after page 1.
    fn clamp_per_page(&mut self) {
        let clamped = self.per_page.clamp(1, MAX_PER_PAGE);
        if clamped != self.per_page {
            warn!(configured = self.per_page, used = clamped, "github.per_page out of range");
            self.per_page = clamped;
        }
    }
}

/// Row filtering and feature definitions for the derivation stage.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeriveConfig {
    pub min_review_hours: f64,
    pub allowed_states: Vec<PrState>,
    /// Drop rows whose review count is known to be zero.
    pub require_reviews: bool,
    pub interaction_formula: InteractionFormula,
}

impl Default for DeriveConfig {
    fn default() -> Self {
        Self {
            min_review_hours: 1.0,
            allowed_states: vec![PrState::Closed],
            require_reviews: true,
            interaction_formula: InteractionFormula::CommentsBased,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// p-values strictly below this are flagged as significant.
    pub significance: f64,
    /// Also correlate each status-dimension metric against 0/1 merge status.
    pub status_correlation: bool,
    /// Also test changed files / total lines and participants / comments
    /// separately from the combined size and interactions metrics.
    pub component_breakdown: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            significance: 0.05,
            status_correlation: true,
            component_breakdown: false,
        }
    }
}

/// Locations of the three tables exchanged between stages.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub repos: PathBuf,
    pub raw: PathBuf,
    pub clean: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            repos: PathBuf::from("data/processed/top_repos.csv"),
            raw: PathBuf::from("data/raw/prs_sample.csv"),
            clean: PathBuf::from("data/processed/prs_clean.csv"),
        }
    }
}

impl Config {
    /// Load configuration from an explicit path, or from .pr-review-study.toml
    /// in the current directory. Returns default config if that file doesn't exist.
    pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::load_from(path)
                } else {
                    Ok(Config::default())
                }
            }
        }
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Config, ConfigError> {
        let mut config: Config = toml::from_str(contents)?;
        config.github.clamp_per_page();
        Ok(config)
    }

    /// Resolve the GitHub token: config file value takes precedence,
    /// falls back to GITHUB_TOKEN env var.
    pub fn github_token(&self) -> Option<String> {
        self.github
            .token
            .clone()
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .filter(|token| !token.trim().is_empty())
    }
}
