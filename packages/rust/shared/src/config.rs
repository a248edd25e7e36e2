//! Application configuration for buildline.
//!
//! User config lives at `~/.buildline/buildline.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BuildlineError, Result};
use crate::types::HistoryKind;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "buildline.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".buildline";

/// Placeholder substituted with a repository id in endpoint templates.
const REPO_PLACEHOLDER: &str = "{repo}";

// ---------------------------------------------------------------------------
// Config structs (matching buildline.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Which repositories and platforms to query.
    #[serde(default)]
    pub source: SourceConfig,

    /// External service endpoints.
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Timeouts, retries, paging and politeness.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Where history artifacts are written.
    #[serde(default)]
    pub output: OutputConfig,
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Upstream repository (`owner/name`) whose tags are listed.
    #[serde(default = "default_repo_id")]
    pub repo_id: String,

    /// Fork repository whose releases are listed.
    #[serde(default = "default_fork_repo_id")]
    pub fork_repo_id: String,

    /// Name of the env var holding the listing API token (never store the token itself).
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Platform used for retrieval lookups.
    #[serde(default = "default_reference_platform")]
    pub reference_platform: String,

    /// Platform used for the recent-builds listing.
    #[serde(default = "default_discovery_platform")]
    pub discovery_platform: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            repo_id: default_repo_id(),
            fork_repo_id: default_fork_repo_id(),
            token_env: default_token_env(),
            reference_platform: default_reference_platform(),
            discovery_platform: default_discovery_platform(),
        }
    }
}

fn default_repo_id() -> String {
    "microsoft/vscode".into()
}
fn default_fork_repo_id() -> String {
    "VSCodium/vscodium-insiders".into()
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".into()
}
fn default_reference_platform() -> String {
    "darwin".into()
}
fn default_discovery_platform() -> String {
    "darwin-arm64".into()
}

/// `[endpoints]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointsConfig {
    /// Tag listing URL template; `{repo}` is replaced with the repo id.
    #[serde(default = "default_tags_endpoint")]
    pub tags: String,

    /// Build-metadata retrieval base (`<base>/<key>/<platform>/<quality>`).
    #[serde(default = "default_metadata_endpoint")]
    pub metadata: String,

    /// Build-metadata discovery base (`<base>/<quality>/<platform>`).
    #[serde(default = "default_discovery_endpoint")]
    pub discovery: String,

    /// Fork release listing URL template; `{repo}` is replaced with the fork repo id.
    #[serde(default = "default_fork_releases_endpoint")]
    pub fork_releases: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            tags: default_tags_endpoint(),
            metadata: default_metadata_endpoint(),
            discovery: default_discovery_endpoint(),
            fork_releases: default_fork_releases_endpoint(),
        }
    }
}

impl EndpointsConfig {
    /// Point every endpoint at one base URL (mock servers in tests).
    pub fn rooted_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            tags: format!("{base}/repos/{REPO_PLACEHOLDER}/tags"),
            metadata: format!("{base}/api/versions"),
            discovery: format!("{base}/api/commits"),
            fork_releases: format!("{base}/repos/{REPO_PLACEHOLDER}/releases"),
        }
    }

    /// Tag listing URL for `repo_id`.
    pub fn tags_url(&self, repo_id: &str) -> String {
        self.tags.replace(REPO_PLACEHOLDER, repo_id)
    }

    /// Release listing URL for `repo_id`.
    pub fn fork_releases_url(&self, repo_id: &str) -> String {
        self.fork_releases.replace(REPO_PLACEHOLDER, repo_id)
    }
}

fn default_tags_endpoint() -> String {
    "https://api.github.com/repos/{repo}/tags".into()
}
fn default_metadata_endpoint() -> String {
    "https://update.code.visualstudio.com/api/versions".into()
}
fn default_discovery_endpoint() -> String {
    "https://update.code.visualstudio.com/api/commits".into()
}
fn default_fork_releases_endpoint() -> String {
    "https://api.github.com/repos/{repo}/releases".into()
}

/// `[network]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Timeout for listing requests, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout for each metadata lookup, in seconds. Kept short: lookups are
    /// issued once per candidate build, sequentially.
    #[serde(default = "default_metadata_timeout")]
    pub metadata_timeout_secs: u64,

    /// Wait before retrying a rate-limited listing page, in seconds.
    #[serde(default = "default_rate_limit_backoff")]
    pub rate_limit_backoff_secs: u64,

    /// Extra attempts for a rate-limited listing page.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Items requested per listing page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Upper bound on fork release pages.
    #[serde(default = "default_fork_max_pages")]
    pub fork_max_pages: u32,

    /// Fixed sleep inserted after each batch of calls, in ms.
    #[serde(default = "default_politeness_delay")]
    pub politeness_delay_ms: u64,

    /// Metadata lookups per politeness batch.
    #[serde(default = "default_politeness_batch")]
    pub politeness_batch: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            metadata_timeout_secs: default_metadata_timeout(),
            rate_limit_backoff_secs: default_rate_limit_backoff(),
            max_retries: default_max_retries(),
            page_size: default_page_size(),
            fork_max_pages: default_fork_max_pages(),
            politeness_delay_ms: default_politeness_delay(),
            politeness_batch: default_politeness_batch(),
        }
    }
}

fn default_request_timeout() -> u64 {
    10
}
fn default_metadata_timeout() -> u64 {
    3
}
fn default_rate_limit_backoff() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    1
}
fn default_page_size() -> u32 {
    100
}
fn default_fork_max_pages() -> u32 {
    5
}
fn default_politeness_delay() -> u64 {
    1000
}
fn default_politeness_batch() -> u32 {
    50
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory the artifacts are written to.
    #[serde(default = "default_output_dir")]
    pub dir: String,

    #[serde(default = "default_stable_file")]
    pub stable_file: String,

    #[serde(default = "default_insider_file")]
    pub insider_file: String,

    #[serde(default = "default_fork_file")]
    pub fork_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            stable_file: default_stable_file(),
            insider_file: default_insider_file(),
            fork_file: default_fork_file(),
        }
    }
}

impl OutputConfig {
    /// Path of the artifact for `history`.
    pub fn path_for(&self, history: HistoryKind) -> PathBuf {
        let file = match history {
            HistoryKind::Stable => &self.stable_file,
            HistoryKind::Insider => &self.insider_file,
            HistoryKind::Fork => &self.fork_file,
        };
        Path::new(&self.dir).join(file)
    }
}

fn default_output_dir() -> String {
    ".".into()
}
fn default_stable_file() -> String {
    "vscode_stable_history.json".into()
}
fn default_insider_file() -> String {
    "vscode_insider_history.json".into()
}
fn default_fork_file() -> String {
    "vscodium_insider_history.json".into()
}

// ---------------------------------------------------------------------------
// Fetch config (runtime, merged from config + environment)
// ---------------------------------------------------------------------------

/// Runtime configuration handed to every network-facing component.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Upstream repository whose tags are listed.
    pub repo_id: String,
    /// Fork repository whose releases are listed.
    pub fork_repo_id: String,
    /// Bearer token for the listing API, if one was found.
    pub auth_token: Option<String>,
    pub endpoints: EndpointsConfig,
    pub reference_platform: String,
    pub discovery_platform: String,
    /// Timeout for listing requests.
    pub request_timeout: Duration,
    /// Timeout for each metadata lookup.
    pub metadata_timeout: Duration,
    /// Wait before retrying a rate-limited page.
    pub rate_limit_backoff: Duration,
    /// Extra attempts for a rate-limited page.
    pub max_retries: u32,
    pub page_size: u32,
    pub fork_max_pages: u32,
    pub politeness_delay: Duration,
    pub politeness_batch: u32,
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            repo_id: config.source.repo_id.clone(),
            fork_repo_id: config.source.fork_repo_id.clone(),
            auth_token: None,
            endpoints: config.endpoints.clone(),
            reference_platform: config.source.reference_platform.clone(),
            discovery_platform: config.source.discovery_platform.clone(),
            request_timeout: Duration::from_secs(config.network.request_timeout_secs),
            metadata_timeout: Duration::from_secs(config.network.metadata_timeout_secs),
            rate_limit_backoff: Duration::from_secs(config.network.rate_limit_backoff_secs),
            max_retries: config.network.max_retries,
            page_size: config.network.page_size,
            fork_max_pages: config.network.fork_max_pages,
            politeness_delay: Duration::from_millis(config.network.politeness_delay_ms),
            politeness_batch: config.network.politeness_batch,
        }
    }
}

impl FetchConfig {
    /// Build the runtime config and pick up the token from the environment.
    pub fn from_app(config: &AppConfig) -> Self {
        let mut fetch = Self::from(config);
        fetch.auth_token = resolve_token(config);
        fetch
    }

    /// Config pointed at a single base URL with no delays (mock servers in tests).
    pub fn for_base_url(base: &str) -> Self {
        let mut fetch = Self::from(&AppConfig::default());
        fetch.endpoints = EndpointsConfig::rooted_at(base);
        fetch.rate_limit_backoff = Duration::ZERO;
        fetch.politeness_delay = Duration::ZERO;
        fetch
    }
}

/// Read the listing API token from the env var named in the config.
///
/// A missing token is not an error; it only lowers the provider's rate limit.
pub fn resolve_token(config: &AppConfig) -> Option<String> {
    let var_name = &config.source.token_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Some(val.trim().to_string()),
        _ => {
            tracing::warn!(
                env = %var_name,
                "no API token set; unauthenticated listing requests are heavily rate limited"
            );
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.buildline/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| BuildlineError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.buildline/buildline.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| BuildlineError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        BuildlineError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| BuildlineError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| BuildlineError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| BuildlineError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject settings that would make paging or lookups meaningless.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.network.page_size == 0 {
        return Err(BuildlineError::config("network.page_size must be at least 1"));
    }
    if config.network.politeness_batch == 0 {
        return Err(BuildlineError::config(
            "network.politeness_batch must be at least 1",
        ));
    }
    if !config.source.repo_id.contains('/') || !config.source.fork_repo_id.contains('/') {
        return Err(BuildlineError::config(
            "repository ids must have the form owner/name",
        ));
    }
    Ok(())
}
