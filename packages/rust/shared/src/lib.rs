//! Shared types, error model, and configuration for buildline.
//!
//! This crate is the foundation depended on by all other buildline crates.
//! It provides:
//! - [`BuildlineError`]: the unified error type
//! - Domain types ([`RawTag`], [`ParsedVersion`], [`BuildRecord`], [`DateValue`])
//! - Configuration ([`AppConfig`], [`FetchConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, EndpointsConfig, FetchConfig, NetworkConfig, OutputConfig, SourceConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from, resolve_token,
    validate_config,
};
pub use error::{BuildlineError, Result};
pub use types::{
    AssetMap, BuildRecord, COMMIT_SHA_LEN, Channel, DateValue, ForkRelease, HistoryEntry, HistoryKind,
    Origin, ParsedVersion, RawTag, ReleaseAsset, SYNTHETIC_MAJOR_FLOOR, is_commit_sha,
};
