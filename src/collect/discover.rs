use tracing::{info, instrument, warn};

use super::types::RepositoryRecord;
use crate::github::types::RepositoryItem;
use crate::github::{fetch_page, ApiSource, Endpoint, FetchError};

const STAR_QUERY: &str = "stars:>1000";

/// Find the `limit` most-starred repositories through the search API.
///
/// A failure on the first page is returned to the caller; a failure on a
/// later page keeps what was already gathered.
#[instrument(skip(source))]
pub async fn discover_repositories(
    source: &dyn ApiSource,
    limit: usize,
    per_page: u32,
) -> Result<Vec<RepositoryRecord>, FetchError> {
    let endpoint = Endpoint::search("/search/repositories", per_page)
        .with_param("q", STAR_QUERY)
        .with_param("sort", "stars")
        .with_param("order", "desc");

    let mut repositories = Vec::new();
    let mut page = 1;
    while repositories.len() < limit {
        let fetched = match fetch_page::<RepositoryItem>(source, &endpoint, page).await {
            Ok(fetched) => fetched,
            Err(err) if repositories.is_empty() => return Err(err),
            Err(err) => {
                warn!(page, error = %err, "repository search page failed, keeping partial list");
                break;
            }
        };
        let has_more = fetched.has_more;
        repositories.extend(fetched.items.into_iter().map(RepositoryRecord::from));
        info!(page, total = repositories.len(), "repository page collected");
        if !has_more {
            break;
        }
        page += 1;
    }

    repositories.truncate(limit);
    Ok(repositories)
}

impl From<RepositoryItem> for RepositoryRecord {
    fn from(item: RepositoryItem) -> Self {
        RepositoryRecord {
            id: item.id,
            name: item.name,
            full_name: item.full_name,
            url: item.html_url,
            stars: item.stargazers_count,
            forks: item.forks_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::testing::FakeSource;
    use serde_json::{json, Value};

    fn repo(id: u64, full_name: &str, stars: u64) -> Value {
        json!({
            "id": id,
            "name": full_name.split('/').nth(1).unwrap(),
            "full_name": full_name,
            "html_url": format!("https://github.com/{full_name}"),
            "stargazers_count": stars,
            "forks_count": 1
        })
    }

    #[tokio::test]
    async fn test_discover_pages_until_limit() {
        let source = FakeSource::new()
            .with_json(
                "/search/repositories?page=1",
                json!({ "items": [repo(1, "a/one", 900_000), repo(2, "b/two", 800_000)] }),
            )
            .with_json(
                "/search/repositories?page=2",
                json!({ "items": [repo(3, "c/three", 700_000), repo(4, "d/four", 600_000)] }),
            );

        let repos = discover_repositories(&source, 3, 2).await.unwrap();
        let names: Vec<&str> = repos.iter().map(|r| r.full_name.as_str()).collect();
        assert_eq!(names, vec!["a/one", "b/two", "c/three"]);
        assert_eq!(repos[0].url, "https://github.com/a/one");
        assert_eq!(repos[0].stars, 900_000);
        assert_eq!(source.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_discover_first_page_failure_is_error() {
        let source = FakeSource::new().with_status("/search/repositories?page=1", 401);
        let result = discover_repositories(&source, 10, 100).await;
        assert!(matches!(result, Err(FetchError::Status { status: 401, .. })));
    }

    #[tokio::test]
    async fn test_discover_later_failure_keeps_partial() {
        let source = FakeSource::new()
            .with_json("/search/repositories?page=1", json!({ "items": [repo(1, "a/one", 5)] }))
            .with_status("/search/repositories?page=2", 422);

        let repos = discover_repositories(&source, 10, 1).await.unwrap();
        assert_eq!(repos.len(), 1);
    }
}
