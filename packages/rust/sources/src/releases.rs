//! Fork release listing.

use tracing::{info, instrument};

use buildline_shared::{FetchConfig, ForkRelease, Result};

use crate::client::{Listing, ListingClient, PagePlan};

/// Page-capped release retrieval for the fork repository.
pub struct ReleaseLister {
    client: ListingClient,
    config: FetchConfig,
}

impl ReleaseLister {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        Ok(Self {
            client: ListingClient::new(config)?,
            config: config.clone(),
        })
    }

    /// Releases of `repo_id` in listing order (newest first), at most
    /// `fork_max_pages` pages, pausing `politeness_delay` between pages.
    #[instrument(skip(self))]
    pub async fn fetch_releases(&self, repo_id: &str) -> Listing<ForkRelease> {
        let base = self.config.endpoints.fork_releases_url(repo_id);
        let plan = PagePlan {
            max_pages: Some(self.config.fork_max_pages),
            page_delay: self.config.politeness_delay,
        };

        let listing = self.client.paginate::<ForkRelease>(&base, plan).await;
        info!(
            releases = listing.items.len(),
            pages = listing.pages_fetched,
            stop = ?listing.stop,
            "fetched fork releases"
        );
        listing
    }
}
