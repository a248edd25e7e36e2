//! HTTP plumbing shared by the listing and metadata clients.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use buildline_shared::{BuildlineError, FetchConfig, Result};

/// User-Agent string for every outgoing request.
const USER_AGENT: &str = concat!("buildline/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// Build a reqwest client with the given per-request timeout.
pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(timeout)
        .build()
        .map_err(|e| BuildlineError::Network(format!("failed to build HTTP client: {e}")))
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// Why a paginated listing stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingStop {
    /// A short or empty page marked the end of the listing.
    Exhausted,
    /// The configured page cap was reached.
    PageCap,
    /// A page could not be fetched; items gathered before it are kept.
    Aborted(String),
}

/// Items collected from a paginated listing, possibly partial.
#[derive(Debug, Clone)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub pages_fetched: u32,
    pub stop: ListingStop,
}

impl<T> Listing<T> {
    /// `false` when pagination was cut short by a failure.
    pub fn is_complete(&self) -> bool {
        !matches!(self.stop, ListingStop::Aborted(_))
    }
}

/// Paging behaviour for one listing.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PagePlan {
    pub max_pages: Option<u32>,
    /// Fixed pause after each page.
    pub page_delay: Duration,
}

/// Client for page/per_page listing APIs with bounded rate-limit retry.
#[derive(Debug, Clone)]
pub(crate) struct ListingClient {
    client: Client,
    auth_token: Option<String>,
    page_size: u32,
    rate_limit_backoff: Duration,
    max_retries: u32,
}

impl ListingClient {
    pub(crate) fn new(config: &FetchConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.request_timeout)?,
            auth_token: config.auth_token.clone(),
            page_size: config.page_size.max(1),
            rate_limit_backoff: config.rate_limit_backoff,
            max_retries: config.max_retries,
        })
    }

    /// Walk `base_url` page by page until a short page, the page cap, or a
    /// failure. Never returns an error: a failure ends the walk and whatever
    /// was gathered so far is returned.
    pub(crate) async fn paginate<T: DeserializeOwned>(
        &self,
        base_url: &str,
        plan: PagePlan,
    ) -> Listing<T> {
        let mut items = Vec::new();
        let mut page: u32 = 1;

        let stop = loop {
            if plan.max_pages.is_some_and(|max| page > max) {
                break ListingStop::PageCap;
            }

            let url = match page_url(base_url, page, self.page_size) {
                Ok(url) => url,
                Err(e) => break ListingStop::Aborted(e.to_string()),
            };

            debug!(%url, page, "fetching listing page");
            match self.fetch_page::<T>(&url).await {
                Ok(batch) => {
                    let count = batch.len();
                    items.extend(batch);
                    if count < self.page_size as usize {
                        break ListingStop::Exhausted;
                    }
                }
                Err(e) => {
                    warn!(page, error = %e, kept = items.len(), "listing aborted, keeping partial result");
                    break ListingStop::Aborted(e.to_string());
                }
            }

            page += 1;
            if !plan.page_delay.is_zero() {
                tokio::time::sleep(plan.page_delay).await;
            }
        };

        let pages_fetched = match stop {
            ListingStop::Aborted(_) => page - 1,
            ListingStop::Exhausted => page,
            ListingStop::PageCap => page - 1,
        };

        Listing {
            items,
            pages_fetched,
            stop,
        }
    }

    /// Fetch one page, waiting out a rate limit up to `max_retries` times.
    async fn fetch_page<T: DeserializeOwned>(&self, url: &Url) -> Result<Vec<T>> {
        let mut retries = 0;
        loop {
            match self.get_page(url).await {
                Err(e) if e.is_rate_limited() && retries < self.max_retries => {
                    retries += 1;
                    warn!(
                        %url,
                        attempt = retries,
                        backoff_secs = self.rate_limit_backoff.as_secs(),
                        "rate limited, backing off before retry"
                    );
                    tokio::time::sleep(self.rate_limit_backoff).await;
                }
                other => return other,
            }
        }
    }

    async fn get_page<T: DeserializeOwned>(&self, url: &Url) -> Result<Vec<T>> {
        let mut request = self
            .client
            .get(url.as_str())
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BuildlineError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(BuildlineError::RateLimited {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(BuildlineError::Network(format!("{url}: HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| BuildlineError::Network(format!("{url}: failed to read body: {e}")))?;

        serde_json::from_str(&body)
            .map_err(|e| BuildlineError::parse(format!("{url}: unexpected listing shape: {e}")))
    }
}

/// `base_url` with `per_page` and `page` query parameters.
fn page_url(base_url: &str, page: u32, page_size: u32) -> Result<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| BuildlineError::config(format!("invalid listing URL '{base_url}': {e}")))?;
    url.query_pairs_mut()
        .append_pair("per_page", &page_size.to_string())
        .append_pair("page", &page.to_string());
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_url_appends_query() {
        let url = page_url("https://api.example.com/repos/a/b/tags", 3, 100).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/repos/a/b/tags?per_page=100&page=3"
        );
    }

    #[test]
    fn page_url_rejects_garbage() {
        assert!(page_url("not a url", 1, 100).is_err());
    }

    #[test]
    fn listing_completeness() {
        let done: Listing<u8> = Listing {
            items: vec![],
            pages_fetched: 1,
            stop: ListingStop::Exhausted,
        };
        assert!(done.is_complete());

        let cut: Listing<u8> = Listing {
            items: vec![1],
            pages_fetched: 1,
            stop: ListingStop::Aborted("HTTP 500".into()),
        };
        assert!(!cut.is_complete());
    }
}
