//! Build-metadata provider: per-build retrieval, the recent-builds discovery
//! window, and the date fallback chain.
//!
//! The provider keeps every stable build retrievable forever but prunes
//! insider builds once they fall out of the recent-builds window. A failed
//! insider lookup for a commit outside that window is therefore permanent.

use std::fmt;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use buildline_shared::{BuildlineError, Channel, DateValue, FetchConfig, Result};

use crate::client::build_client;

/// Size cap of the provider's recent-builds listing.
pub const DISCOVERY_CAP: usize = 200;

// ---------------------------------------------------------------------------
// Lookup keys and results
// ---------------------------------------------------------------------------

/// How a build is addressed in the retrieval API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupKey {
    /// Normalized version string, e.g. `1.85.0-insider`.
    Version(String),
    /// Commit hash, sent as `commit:<sha>`.
    Commit(String),
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Version(v) => f.write_str(v),
            Self::Commit(sha) => write!(f, "commit:{sha}"),
        }
    }
}

/// Retrieval API response body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBuildMetadata {
    /// The provider reports the build's commit hash in this field.
    version: String,
    #[serde(default)]
    timestamp: Option<serde_json::Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    product_version: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Metadata of one build as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildMetadata {
    /// Commit the build was made from.
    pub canonical_commit: String,
    pub timestamp: DateValue,
    pub name: Option<String>,
    pub product_version: Option<String>,
    /// Download URL for the reference platform.
    pub url: Option<String>,
}

impl From<RawBuildMetadata> for BuildMetadata {
    fn from(raw: RawBuildMetadata) -> Self {
        Self {
            canonical_commit: raw.version.to_ascii_lowercase(),
            timestamp: timestamp_value(raw.timestamp.as_ref()),
            name: raw.name,
            product_version: raw.product_version,
            url: raw.url,
        }
    }
}

/// Numbers are epoch milliseconds; strings are kept verbatim.
fn timestamp_value(raw: Option<&serde_json::Value>) -> DateValue {
    match raw {
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(DateValue::Epoch)
            .unwrap_or_default(),
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => DateValue::Iso(s.clone()),
        _ => DateValue::Unknown,
    }
}

/// Date fallback chain: live metadata timestamp, else the origin's own
/// timestamp, else unknown. Neither form is converted into the other.
pub fn resolve_date(live: Option<&BuildMetadata>, origin: &DateValue) -> DateValue {
    match live {
        Some(meta) if meta.timestamp.is_known() => meta.timestamp.clone(),
        _ => origin.clone(),
    }
}

// ---------------------------------------------------------------------------
// Discovery window & retention
// ---------------------------------------------------------------------------

/// Newest-first list of recent commits for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryWindow {
    pub channel: Channel,
    pub commits: Vec<String>,
}

impl DiscoveryWindow {
    pub fn contains(&self, commit: &str) -> bool {
        self.commits.iter().any(|c| c.eq_ignore_ascii_case(commit))
    }

    pub fn newest(&self) -> Option<&str> {
        self.commits.first().map(String::as_str)
    }

    pub fn oldest(&self) -> Option<&str> {
        self.commits.last().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// Whether the provider returned a full window, i.e. older builds exist
    /// beyond it.
    pub fn is_saturated(&self) -> bool {
        self.commits.len() >= DISCOVERY_CAP
    }
}

/// Whether a build can still be retrieved from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionStatus {
    /// Listed in the recent-builds window.
    InWindow,
    /// Outside the window but kept by the provider (stable).
    Retained,
    /// Outside the window and deleted server-side (insider). Lookups will
    /// never succeed; do not retry.
    Pruned,
}

impl RetentionStatus {
    pub fn classify(commit: &str, window: &DiscoveryWindow) -> Self {
        if window.contains(commit) {
            return Self::InWindow;
        }
        match window.channel {
            Channel::Insider => Self::Pruned,
            Channel::Stable | Channel::Unclassified => Self::Retained,
        }
    }

    pub fn is_recoverable(self) -> bool {
        !matches!(self, Self::Pruned)
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Short-timeout client for the build-metadata provider.
pub struct MetadataResolver {
    client: Client,
    config: FetchConfig,
}

impl MetadataResolver {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.metadata_timeout)?,
            config: config.clone(),
        })
    }

    /// Look up one build. `None` covers not-found, timeouts, transport
    /// failures and malformed bodies alike; none of them stop a run.
    #[instrument(skip_all, fields(key = %key, %channel))]
    pub async fn resolve(&self, key: &LookupKey, channel: Channel) -> Option<BuildMetadata> {
        let quality = channel.quality()?;
        let url = format!(
            "{}/{key}/{}/{quality}",
            self.config.endpoints.metadata.trim_end_matches('/'),
            self.config.reference_platform,
        );

        match self.fetch_metadata(&url).await {
            Ok(Some(meta)) => {
                debug!(commit = %meta.canonical_commit, "metadata resolved");
                Some(meta)
            }
            Ok(None) => {
                debug!("no build with this key");
                None
            }
            Err(e) => {
                debug!(error = %e, "metadata unavailable");
                None
            }
        }
    }

    async fn fetch_metadata(&self, url: &str) -> Result<Option<BuildMetadata>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BuildlineError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(BuildlineError::Network(format!("{url}: HTTP {status}")));
        }

        let raw: RawBuildMetadata = response
            .json()
            .await
            .map_err(|e| BuildlineError::parse(format!("{url}: {e}")))?;
        Ok(Some(raw.into()))
    }

    /// Fetch the recent-builds window for `channel`. `None` if it could not
    /// be fetched, in which case no retention judgement can be made.
    #[instrument(skip(self))]
    pub async fn discovery_window(&self, channel: Channel) -> Option<DiscoveryWindow> {
        let quality = channel.quality()?;
        let url = format!(
            "{}/{quality}/{}?released=true",
            self.config.endpoints.discovery.trim_end_matches('/'),
            self.config.discovery_platform,
        );

        let result = async {
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| BuildlineError::Network(format!("{url}: {e}")))?;
            if !response.status().is_success() {
                return Err(BuildlineError::Network(format!(
                    "{url}: HTTP {}",
                    response.status()
                )));
            }
            response
                .json::<Vec<String>>()
                .await
                .map_err(|e| BuildlineError::parse(format!("{url}: {e}")))
        }
        .await;

        match result {
            Ok(commits) => {
                let window = DiscoveryWindow { channel, commits };
                debug!(
                    size = window.len(),
                    newest = window.newest().unwrap_or("-"),
                    oldest = window.oldest().unwrap_or("-"),
                    saturated = window.is_saturated(),
                    "discovery window fetched"
                );
                Some(window)
            }
            Err(e) => {
                warn!(error = %e, "discovery window unavailable");
                None
            }
        }
    }
}
