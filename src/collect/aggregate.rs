use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::types::{ParticipantSet, PrState, PullRequestRecord};
use super::{AggregationError, CollectOptions};
use crate::github::types::PullDetail;
use crate::github::{fetch_all, fetch_one, ApiSource, Endpoint, FetchError};

/// A per-pull-request list resource whose items each name an author.
#[derive(Debug, Clone, Copy)]
pub struct SubResource {
    pub name: &'static str,
    /// Path with `{repo}` and `{number}` placeholders.
    template: &'static str,
    author: fn(&Value) -> Option<&str>,
}

fn user_login(item: &Value) -> Option<&str> {
    item.pointer("/user/login").and_then(Value::as_str)
}

pub const REVIEWS: SubResource = SubResource {
    name: "reviews",
    template: "/repos/{repo}/pulls/{number}/reviews",
    author: user_login,
};

pub const ISSUE_COMMENTS: SubResource = SubResource {
    name: "issue_comments",
    template: "/repos/{repo}/issues/{number}/comments",
    author: user_login,
};

pub const INLINE_COMMENTS: SubResource = SubResource {
    name: "inline_comments",
    template: "/repos/{repo}/pulls/{number}/comments",
    author: user_login,
};

impl SubResource {
    pub fn path(&self, repo: &str, number: u64) -> String {
        self.template
            .replace("{repo}", repo)
            .replace("{number}", &number.to_string())
    }

    /// Author of every item in the resource, in API order. Items without
    /// an author yield None.
    pub async fn fetch_authors(
        &self,
        source: &dyn ApiSource,
        repo: &str,
        number: u64,
        options: &CollectOptions,
    ) -> Result<Vec<Option<String>>, FetchError> {
        let endpoint = Endpoint::list(self.path(repo, number), options.per_page);
        let items: Vec<Value> = fetch_all(source, &endpoint, options.sub_resource_max_pages).await?;
        Ok(items
            .iter()
            .map(|item| (self.author)(item).map(str::to_owned))
            .collect())
    }
}

/// Sub-resources are enrichment: a failed fetch contributes nothing
/// instead of failing the pull request.
async fn fetch_or_empty(
    resource: &SubResource,
    source: &dyn ApiSource,
    repo: &str,
    number: u64,
    options: &CollectOptions,
) -> Vec<Option<String>> {
    match resource.fetch_authors(source, repo, number, options).await {
        Ok(authors) => authors,
        Err(err) => {
            warn!(resource = resource.name, error = %err, "sub-resource unavailable, counting it as empty");
            Vec::new()
        }
    }
}

/// Build the denormalized record for one pull request from its detail
/// plus reviews, issue comments and inline comments.
#[instrument(skip(source, options), fields(repo = %repo, pr = number))]
pub async fn aggregate(
    source: &dyn ApiSource,
    repo: &str,
    number: u64,
    options: &CollectOptions,
) -> Result<PullRequestRecord, AggregationError> {
    let detail: PullDetail = fetch_one(source, &format!("/repos/{repo}/pulls/{number}"))
        .await
        .map_err(|source| AggregationError::Detail {
            repo: repo.to_string(),
            number,
            source,
        })?;

    let reviews = fetch_or_empty(&REVIEWS, source, repo, number, options).await;
    let issue_comments = fetch_or_empty(&ISSUE_COMMENTS, source, repo, number, options).await;
    let inline_comments = fetch_or_empty(&INLINE_COMMENTS, source, repo, number, options).await;

    let mut participants = ParticipantSet::new();
    participants.add(detail.user.as_ref().map(|user| user.login.as_str()));
    for author in reviews.iter().chain(&issue_comments).chain(&inline_comments) {
        participants.add(author.as_deref());
    }

    debug!(
        reviews = reviews.len(),
        issue_comments = issue_comments.len(),
        inline_comments = inline_comments.len(),
        participants = participants.len(),
        "aggregated pull request"
    );

    Ok(into_record(repo, detail, reviews.len(), participants.len()))
}

fn into_record(
    repo: &str,
    detail: PullDetail,
    review_count: usize,
    participants: usize,
) -> PullRequestRecord {
    // The merged flag is derived from the timestamp so the two can never disagree.
    let merged = detail.merged_at.is_some();
    if merged != detail.merged {
        warn!(
            pr = detail.number,
            flag = detail.merged,
            "merged flag disagrees with merged_at; trusting merged_at"
        );
    }
    let body_length = detail
        .body
        .as_deref()
        .map_or(0, |body| body.chars().count() as u64);

    PullRequestRecord {
        repo_full_name: repo.to_string(),
        id: detail.id,
        number: detail.number,
        title: detail.title,
        author: detail.user.map(|user| user.login),
        created_at: detail.created_at,
        closed_at: detail.closed_at,
        merged_at: detail.merged_at,
        comments: detail.comments,
        review_comments: detail.review_comments,
        changed_files: detail.changed_files,
        additions: detail.additions,
        deletions: detail.deletions,
        state: PrState::from_api(&detail.state),
        merged,
        body_length,
        review_count: Some(review_count as u64),
        participants_count: Some(participants as u64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::testing::FakeSource;
    use serde_json::json;

    fn detail_json(number: u64, author: Option<&str>) -> Value {
        json!({
            "id": 1000 + number,
            "number": number,
            "title": format!("PR {number}"),
            "user": author.map(|login| json!({ "login": login })),
            "body": "Fixes the thing",
            "state": "closed",
            "created_at": "2024-03-01T10:00:00Z",
            "closed_at": "2024-03-01T16:00:00Z",
            "merged_at": "2024-03-01T15:00:00Z",
            "merged": true,
            "comments": 1,
            "review_comments": 0,
            "changed_files": 2,
            "additions": 10,
            "deletions": 3
        })
    }

    fn authored(login: Option<&str>) -> Value {
        json!({ "user": login.map(|login| json!({ "login": login })) })
    }

    #[tokio::test]
    async fn test_participants_deduplicated_across_sources() {
        let source = FakeSource::new()
            .with_json("/repos/o/r/pulls/7", detail_json(7, Some("alice")))
            .with_json("/repos/o/r/pulls/7/reviews?page=1", json!([authored(Some("alice"))]))
            .with_json("/repos/o/r/issues/7/comments?page=1", json!([authored(Some("bob"))]))
            .with_json("/repos/o/r/pulls/7/comments?page=1", json!([{ "user": null }]));

        let record = aggregate(&source, "o/r", 7, &CollectOptions::default()).await.unwrap();
        assert_eq!(record.participants_count, Some(2));
        assert_eq!(record.review_count, Some(1));
        assert_eq!(record.author.as_deref(), Some("alice"));
        assert_eq!(record.repo_full_name, "o/r");
    }

    #[tokio::test]
    async fn test_missing_pr_author_is_not_a_participant() {
        let source = FakeSource::new()
            .with_json("/repos/o/r/pulls/8", detail_json(8, None))
            .with_json("/repos/o/r/pulls/8/reviews?page=1", json!([authored(Some("carol"))]))
            .with_json("/repos/o/r/issues/8/comments?page=1", json!([]))
            .with_json("/repos/o/r/pulls/8/comments?page=1", json!([]));

        let record = aggregate(&source, "o/r", 8, &CollectOptions::default()).await.unwrap();
        assert!(record.author.is_none());
        assert_eq!(record.participants_count, Some(1));
    }

    #[tokio::test]
    async fn test_failed_sub_resources_count_as_empty() {
        let source = FakeSource::new()
            .with_json("/repos/o/r/pulls/9", detail_json(9, Some("alice")))
            .with_status("/repos/o/r/pulls/9/reviews?page=1", 500)
            .with_json("/repos/o/r/issues/9/comments?page=1", json!([authored(Some("bob"))]));

        let record = aggregate(&source, "o/r", 9, &CollectOptions::default()).await.unwrap();
        assert_eq!(record.review_count, Some(0));
        assert_eq!(record.participants_count, Some(2));
    }

    #[tokio::test]
    async fn test_detail_failure_is_an_aggregation_error() {
        let source = FakeSource::new().with_status("/repos/o/r/pulls/10", 403);
        let err = aggregate(&source, "o/r", 10, &CollectOptions::default())
            .await
            .unwrap_err();
        let AggregationError::Detail { repo, number, source } = err;
        assert_eq!(repo, "o/r");
        assert_eq!(number, 10);
        assert!(matches!(source, FetchError::Status { status: 403, .. }));
    }

    #[tokio::test]
    async fn test_record_fields_copied_from_detail() {
        let mut detail = detail_json(11, Some("dave"));
        detail["body"] = json!("héllo");
        let source = FakeSource::new().with_json("/repos/o/r/pulls/11", detail);

        let record = aggregate(&source, "o/r", 11, &CollectOptions::default()).await.unwrap();
        assert_eq!(record.id, 1011);
        assert_eq!(record.body_length, 5);
        assert_eq!(record.state, PrState::Closed);
        assert!(record.merged);
        assert!(record.merged_at.is_some());
        assert_eq!(record.changed_files, 2);
        assert_eq!(record.comments, 1);
    }

    #[tokio::test]
    async fn test_null_body_has_zero_length() {
        let mut detail = detail_json(12, Some("erin"));
        detail["body"] = Value::Null;
        detail["merged_at"] = Value::Null;
        detail["merged"] = json!(false);
        let source = FakeSource::new().with_json("/repos/o/r/pulls/12", detail);

        let record = aggregate(&source, "o/r", 12, &CollectOptions::default()).await.unwrap();
        assert_eq!(record.body_length, 0);
        assert!(!record.merged);
        assert!(record.merged_at.is_none());
    }

    #[tokio::test]
    async fn test_sub_resources_are_paginated() {
        let options = CollectOptions {
            per_page: 1,
            ..CollectOptions::default()
        };
        let source = FakeSource::new()
            .with_json("/repos/o/r/pulls/13", detail_json(13, Some("alice")))
            .with_json("/repos/o/r/pulls/13/reviews?page=1", json!([authored(Some("bob"))]))
            .with_json("/repos/o/r/pulls/13/reviews?page=2", json!([authored(Some("carol"))]))
            .with_json("/repos/o/r/pulls/13/reviews?page=3", json!([]));

        let record = aggregate(&source, "o/r", 13, &options).await.unwrap();
        assert_eq!(record.review_count, Some(2));
        assert_eq!(record.participants_count, Some(3));
    }

    #[tokio::test]
    async fn test_later_review_page_failure_keeps_earlier_reviews() {
        let options = CollectOptions {
            per_page: 2,
            ..CollectOptions::default()
        };
        let source = FakeSource::new()
            .with_json("/repos/o/r/pulls/14", detail_json(14, Some("alice")))
            .with_json(
                "/repos/o/r/pulls/14/reviews?page=1",
                json!([authored(Some("bob")), authored(Some("carol"))]),
            )
            .with_status("/repos/o/r/pulls/14/reviews?page=2", 502)
            .with_json("/repos/o/r/issues/14/comments?page=1", json!([]))
            .with_json("/repos/o/r/pulls/14/comments?page=1", json!([]));

        let record = aggregate(&source, "o/r", 14, &options).await.unwrap();
        assert_eq!(record.review_count, Some(2));
        assert_eq!(record.participants_count, Some(3));

        let row = crate::derive::derive_row(record, &crate::config::DeriveConfig::default());
        assert!(row.is_ok());
    }

    #[tokio::test]
    async fn test_single_page_sub_resources_with_cap() {
        let options = CollectOptions {
            per_page: 1,
            sub_resource_max_pages: Some(1),
            ..CollectOptions::default()
        };
        let source = FakeSource::new()
            .with_json("/repos/o/r/pulls/15", detail_json(15, Some("alice")))
            .with_json("/repos/o/r/pulls/15/reviews?page=1", json!([authored(Some("bob"))]))
            .with_json("/repos/o/r/pulls/15/reviews?page=2", json!([authored(Some("carol"))]));

        let record = aggregate(&source, "o/r", 15, &options).await.unwrap();
        assert_eq!(record.review_count, Some(1));
        assert!(!source
            .calls()
            .contains(&"/repos/o/r/pulls/15/reviews?page=2".to_string()));
    }

    #[test]
    fn test_sub_resource_paths() {
        assert_eq!(REVIEWS.path("o/r", 3), "/repos/o/r/pulls/3/reviews");
        assert_eq!(ISSUE_COMMENTS.path("o/r", 3), "/repos/o/r/issues/3/comments");
        assert_eq!(INLINE_COMMENTS.path("o/r", 3), "/repos/o/r/pulls/3/comments");
    }
}
