mod analysis;
mod collect;
mod config;
mod dataset;
mod derive;
mod github;
mod report;
mod stats;

use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{info, info_span};
use tracing_subscriber::EnvFilter;

use collect::{CollectOptions, PullRequestRecord};
use derive::DerivedMetricsRow;
use github::GitHubClient;

/// PR Review Study: collects pull request activity from popular GitHub
/// repositories and tests how PR characteristics relate to merge status
/// and review volume.
#[derive(Parser, Debug)]
#[command(name = "pr-review-study", version, about)]
struct Cli {
    /// Path to a TOML configuration file (defaults to .pr-review-study.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    stage: Stage,
}

#[derive(Subcommand, Debug)]
enum Stage {
    /// Discover the most-starred repositories
    Repos {
        /// Number of repositories to keep
        #[arg(long, default_value_t = 200)]
        limit: usize,

        /// Repository list CSV to write
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Collect pull requests with review activity for listed repositories
    Collect {
        /// Repository list CSV (needs a full_name column)
        #[arg(long)]
        repos: Option<PathBuf>,

        /// Raw pull request CSV to write
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of repositories to walk, from the top of the list
        #[arg(long)]
        max_repos: Option<usize>,

        /// Pull request list pages per repository
        #[arg(long)]
        max_pages: Option<u32>,
    },

    /// Derive metrics and filter the raw table
    Process {
        /// Raw pull request CSV
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Cleaned CSV to write
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the statistical comparisons over the cleaned table
    Analyze {
        /// Cleaned CSV
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Optional output file path for markdown report
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// The one column the collect stage needs from the repository list.
#[derive(Debug, Deserialize)]
struct RepoName {
    full_name: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!("loading configuration");
    let mut config = config::Config::load(cli.config.as_deref())?;

    match cli.stage {
        Stage::Repos { limit, output } => {
            let _span = info_span!("repos", limit).entered();
            let output = output.unwrap_or_else(|| config.paths.repos.clone());
            let client = GitHubClient::from_config(&config.github, config.github_token());

            info!("searching repositories by stars");
            let repositories =
                collect::discover_repositories(&client, limit, config.github.per_page).await?;
            dataset::write_table(&output, &repositories)?;
            info!(count = repositories.len(), path = %output.display(), "repository list written");
        }

        Stage::Collect {
            repos,
            output,
            max_repos,
            max_pages,
        } => {
            if let Some(max_pages) = max_pages {
                config.github.max_pages = max_pages;
            }
            let max_repos = max_repos.unwrap_or(config.github.max_repos);
            let repos = repos.unwrap_or_else(|| config.paths.repos.clone());
            let output = output.unwrap_or_else(|| config.paths.raw.clone());
            let _span = info_span!("collect", max_repos, max_pages = config.github.max_pages).entered();

            let names: Vec<String> = dataset::read_table::<RepoName>(&repos)?
                .into_iter()
                .take(max_repos)
                .map(|repo| repo.full_name)
                .collect();
            info!(repositories = names.len(), "walking repositories");

            let client = GitHubClient::from_config(&config.github, config.github_token());
            let options = CollectOptions::from_config(&config.github);
            let records = collect::collect(&client, &names, &options).await;
            dataset::write_table(&output, &records)?;
            info!(records = records.len(), path = %output.display(), "raw table written");
        }

        Stage::Process { input, output } => {
            let input = input.unwrap_or_else(|| config.paths.raw.clone());
            let output = output.unwrap_or_else(|| config.paths.clean.clone());
            let _span = info_span!("process", input = %input.display()).entered();

            let records = dataset::read_table::<PullRequestRecord>(&input)?;
            info!(records = records.len(), "raw table loaded");
            let rows = derive::derive(records, &config.derive);
            dataset::write_table(&output, &rows)?;
            info!(rows = rows.len(), path = %output.display(), "cleaned table written");
        }

        Stage::Analyze { input, output } => {
            let input = input.unwrap_or_else(|| config.paths.clean.clone());
            let _span = info_span!("analyze", input = %input.display()).entered();

            let rows = dataset::read_table::<DerivedMetricsRow>(&input)?;
            info!(rows = rows.len(), "running analysis");
            let results = analysis::run_all(&rows, &config.analysis);

            info!("generating report");
            let built_report = report::build(results, &rows, config.analysis.significance);
            report::output(&built_report, output.as_deref())?;
            info!(significant = built_report.significant_count(), "done");
        }
    }

    Ok(())
}
