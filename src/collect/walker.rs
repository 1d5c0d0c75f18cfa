use tracing::{debug, info, info_span, warn, Instrument};

use super::aggregate::aggregate;
use super::types::PullRequestRecord;
use super::CollectOptions;
use crate::github::types::PullSummary;
use crate::github::{fetch_page, ApiSource, Endpoint};

/// Collect every reachable pull request of the given repositories.
///
/// Output order is repository input order, then the API's listing order.
/// Failures never abort the walk: a failed pull request is skipped and a
/// failed listing page ends that repository only.
pub async fn collect(
    source: &dyn ApiSource,
    repositories: &[String],
    options: &CollectOptions,
) -> Vec<PullRequestRecord> {
    let mut records = Vec::new();
    for repo in repositories {
        let before = records.len();
        walk_repository(source, repo, options, &mut records)
            .instrument(info_span!("walk", repo = %repo))
            .await;
        info!(repo = %repo, collected = records.len() - before, total = records.len(), "repository done");
    }
    records
}

async fn walk_repository(
    source: &dyn ApiSource,
    repo: &str,
    options: &CollectOptions,
    records: &mut Vec<PullRequestRecord>,
) {
    let endpoint = Endpoint::list(format!("/repos/{repo}/pulls"), options.per_page)
        .with_param("state", "all");

    for page in 1..=options.max_pages {
        info!(page, "listing pull requests");
        let listed = match fetch_page::<PullSummary>(source, &endpoint, page).await {
            Ok(listed) => listed,
            Err(err) => {
                warn!(page, error = %err, "pull request listing failed, moving to next repository");
                break;
            }
        };
        if listed.items.is_empty() {
            info!(page, "no pull requests on page");
            break;
        }

        let total = listed.items.len();
        for (index, summary) in listed.items.iter().enumerate() {
            debug!(pr = summary.number, position = index + 1, total, page, "processing pull request");
            match aggregate(source, repo, summary.number, options).await {
                Ok(record) => records.push(record),
                Err(err) => warn!(error = %err, "skipping pull request"),
            }
        }

        if !listed.has_more {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::testing::FakeSource;
    use serde_json::{json, Value};

    fn detail(number: u64) -> Value {
        json!({
            "id": number,
            "number": number,
            "title": "t",
            "user": { "login": "alice" },
            "body": null,
            "state": "closed",
            "created_at": "2024-01-01T00:00:00Z",
            "closed_at": "2024-01-02T00:00:00Z",
            "merged_at": null
        })
    }

    fn numbers(records: &[PullRequestRecord]) -> Vec<(String, u64)> {
        records
            .iter()
            .map(|r| (r.repo_full_name.clone(), r.number))
            .collect()
    }

    #[tokio::test]
    async fn test_collect_preserves_repository_and_listing_order() {
        let source = FakeSource::new()
            .with_json("/repos/a/one/pulls?page=1", json!([{ "number": 9 }, { "number": 3 }]))
            .with_json("/repos/a/one/pulls/9", detail(9))
            .with_json("/repos/a/one/pulls/3", detail(3))
            .with_json("/repos/b/two/pulls?page=1", json!([{ "number": 1 }]))
            .with_json("/repos/b/two/pulls/1", detail(1));

        let repos = vec!["a/one".to_string(), "b/two".to_string()];
        let records = collect(&source, &repos, &CollectOptions::default()).await;
        assert_eq!(
            numbers(&records),
            vec![
                ("a/one".to_string(), 9),
                ("a/one".to_string(), 3),
                ("b/two".to_string(), 1),
            ]
        );
    }

    #[tokio::test]
    async fn test_collect_skips_failed_pull_request() {
        let source = FakeSource::new()
            .with_json("/repos/a/one/pulls?page=1", json!([{ "number": 1 }, { "number": 2 }]))
            .with_status("/repos/a/one/pulls/1", 500)
            .with_json("/repos/a/one/pulls/2", detail(2));

        let records = collect(&source, &["a/one".to_string()], &CollectOptions::default()).await;
        assert_eq!(numbers(&records), vec![("a/one".to_string(), 2)]);
    }

    #[tokio::test]
    async fn test_listing_failure_only_stops_that_repository() {
        let options = CollectOptions {
            per_page: 1,
            max_pages: 5,
            sub_resource_max_pages: Some(1),
        };
        let source = FakeSource::new()
            .with_json("/repos/a/one/pulls?page=1", json!([{ "number": 1 }]))
            .with_json("/repos/a/one/pulls/1", detail(1))
            .with_status("/repos/a/one/pulls?page=2", 502)
            .with_json("/repos/a/one/pulls?page=3", json!([{ "number": 3 }]))
            .with_json("/repos/b/two/pulls?page=1", json!([{ "number": 4 }]))
            .with_json("/repos/b/two/pulls/4", detail(4))
            .with_json("/repos/b/two/pulls?page=2", json!([]));

        let repos = vec!["a/one".to_string(), "b/two".to_string()];
        let records = collect(&source, &repos, &options).await;
        assert_eq!(
            numbers(&records),
            vec![("a/one".to_string(), 1), ("b/two".to_string(), 4)]
        );
        assert!(!source.calls().contains(&"/repos/a/one/pulls?page=3".to_string()));
    }

    #[tokio::test]
    async fn test_page_cap_limits_listing() {
        let options = CollectOptions {
            per_page: 1,
            max_pages: 2,
            sub_resource_max_pages: Some(1),
        };
        let source = FakeSource::new()
            .with_json("/repos/a/one/pulls?page=1", json!([{ "number": 1 }]))
            .with_json("/repos/a/one/pulls?page=2", json!([{ "number": 2 }]))
            .with_json("/repos/a/one/pulls?page=3", json!([{ "number": 3 }]))
            .with_json("/repos/a/one/pulls/1", detail(1))
            .with_json("/repos/a/one/pulls/2", detail(2))
            .with_json("/repos/a/one/pulls/3", detail(3));

        let records = collect(&source, &["a/one".to_string()], &options).await;
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_repository_list() {
        let source = FakeSource::new();
        let records = collect(&source, &[], &CollectOptions::default()).await;
        assert!(records.is_empty());
        assert!(source.calls().is_empty());
    }
}
