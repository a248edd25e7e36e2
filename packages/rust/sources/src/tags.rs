//! Upstream tag listing.

use serde::Deserialize;
use tracing::{debug, info, instrument};

use buildline_shared::{FetchConfig, RawTag, Result, is_commit_sha};

use crate::client::{Listing, ListingClient, PagePlan};

/// Tag item as returned by the listing API.
#[derive(Debug, Deserialize)]
struct TagItem {
    name: String,
    commit: TagCommit,
}

#[derive(Debug, Deserialize)]
struct TagCommit {
    sha: String,
    #[serde(default)]
    url: Option<String>,
}

/// Paginated, rate-limit-aware tag retrieval.
pub struct TagFetcher {
    client: ListingClient,
    config: FetchConfig,
}

impl TagFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        Ok(Self {
            client: ListingClient::new(config)?,
            config: config.clone(),
        })
    }

    /// Every tag of `repo_id`, in listing order.
    ///
    /// A failed page ends pagination; the tags gathered before it are still
    /// returned and the listing is marked incomplete.
    #[instrument(skip(self))]
    pub async fn fetch_all_tags(&self, repo_id: &str) -> Listing<RawTag> {
        let base = self.config.endpoints.tags_url(repo_id);
        let plan = PagePlan {
            max_pages: None,
            page_delay: std::time::Duration::ZERO,
        };

        let listing = self.client.paginate::<TagItem>(&base, plan).await;
        let total = listing.items.len();
        let complete = listing.is_complete();

        let tags: Vec<RawTag> = listing
            .items
            .into_iter()
            .filter_map(|item| {
                if !is_commit_sha(&item.commit.sha) {
                    debug!(tag = %item.name, sha = %item.commit.sha, "tag commit is not a full hash, skipping");
                    return None;
                }
                Some(RawTag {
                    name: item.name,
                    commit_sha: item.commit.sha.to_ascii_lowercase(),
                    commit_url: item.commit.url,
                })
            })
            .collect();

        info!(
            tags = tags.len(),
            skipped = total - tags.len(),
            pages = listing.pages_fetched,
            complete,
            "fetched tags"
        );

        Listing {
            items: tags,
            pages_fetched: listing.pages_fetched,
            stop: listing.stop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ListingStop;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sha(c: char) -> String {
        c.to_string().repeat(40)
    }

    fn tag_json(name: &str, c: char) -> serde_json::Value {
        serde_json::json!({
            "name": name,
            "commit": { "sha": sha(c), "url": format!("https://api.example.com/commits/{}", sha(c)) }
        })
    }

    fn config(server: &MockServer, page_size: u32) -> FetchConfig {
        let mut config = FetchConfig::for_base_url(&server.uri());
        config.page_size = page_size;
        config
    }

    #[tokio::test]
    async fn pages_until_short_page() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/acme/editor/tags"))
            .and(query_param("page", "1"))
            .and(query_param("per_page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                tag_json("1.85.0", 'a'),
                tag_json("1.85.0-insider", 'b'),
            ])))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/repos/acme/editor/tags"))
            .and(query_param("page", "2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!([tag_json("1.84.0", 'c')])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = TagFetcher::new(&config(&server, 2)).unwrap();
        let listing = fetcher.fetch_all_tags("acme/editor").await;

        assert_eq!(listing.stop, ListingStop::Exhausted);
        assert_eq!(listing.pages_fetched, 2);
        let names: Vec<_> = listing.items.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["1.85.0", "1.85.0-insider", "1.84.0"]);
        assert_eq!(listing.items[0].commit_sha, sha('a'));
        assert!(listing.items[0].commit_url.is_some());
    }

    #[tokio::test]
    async fn empty_page_ends_listing() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                tag_json("1.0.0", 'a'),
                tag_json("1.0.1", 'b'),
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = TagFetcher::new(&config(&server, 2)).unwrap();
        let listing = fetcher.fetch_all_tags("acme/editor").await;
        assert!(listing.is_complete());
        assert_eq!(listing.items.len(), 2);
    }

    #[tokio::test]
    async fn rate_limited_page_retried_once() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(403))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("page", "1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!([tag_json("1.0.0", 'a')])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = TagFetcher::new(&config(&server, 100)).unwrap();
        let listing = fetcher.fetch_all_tags("acme/editor").await;
        assert!(listing.is_complete());
        assert_eq!(listing.items.len(), 1);
    }

    #[tokio::test]
    async fn persistent_rate_limit_keeps_partial_result() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                tag_json("1.0.0", 'a'),
                tag_json("1.0.1", 'b'),
            ])))
            .mount(&server)
            .await;
        // One attempt plus exactly one retry.
        Mock::given(method("GET"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(403))
            .expect(2)
            .mount(&server)
            .await;

        let fetcher = TagFetcher::new(&config(&server, 2)).unwrap();
        let listing = fetcher.fetch_all_tags("acme/editor").await;
        assert!(!listing.is_complete());
        assert_eq!(listing.pages_fetched, 1);
        assert_eq!(listing.items.len(), 2);
    }

    #[tokio::test]
    async fn server_error_aborts_without_retry() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = TagFetcher::new(&config(&server, 100)).unwrap();
        let listing = fetcher.fetch_all_tags("acme/editor").await;
        assert!(matches!(listing.stop, ListingStop::Aborted(_)));
        assert!(listing.items.is_empty());
    }

    #[tokio::test]
    async fn sends_bearer_token_when_configured() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(header("authorization", "Bearer secret-token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!([tag_json("1.0.0", 'a')])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut cfg = config(&server, 100);
        cfg.auth_token = Some("secret-token".into());
        let listing = TagFetcher::new(&cfg).unwrap().fetch_all_tags("acme/editor").await;
        assert_eq!(listing.items.len(), 1);
    }

    #[tokio::test]
    async fn short_shas_are_dropped() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "name": "1.0.0", "commit": { "sha": "abc123" } },
                tag_json("1.0.1", 'f'),
            ])))
            .mount(&server)
            .await;

        let listing = TagFetcher::new(&config(&server, 100))
            .unwrap()
            .fetch_all_tags("acme/editor")
            .await;
        assert_eq!(listing.items.len(), 1);
        assert_eq!(listing.items[0].name, "1.0.1");
        assert!(listing.items[0].commit_url.is_some());
    }
}
