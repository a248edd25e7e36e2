//! Core domain types for build histories.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BuildlineError;

/// Major versions at or above this value mark synthetic/test tags.
pub const SYNTHETIC_MAJOR_FLOOR: u32 = 900;

/// Length of a full hexadecimal commit hash.
pub const COMMIT_SHA_LEN: usize = 40;

/// Platform-arch bucket (e.g. `darwin_arm64`) → download URL.
pub type AssetMap = BTreeMap<String, String>;

/// Whether `s` is a full 40-character hexadecimal commit hash.
pub fn is_commit_sha(s: &str) -> bool {
    s.len() == COMMIT_SHA_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}

// ---------------------------------------------------------------------------
// RawTag
// ---------------------------------------------------------------------------

/// A tag as returned by the source-control tag listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTag {
    /// Tag name as published (e.g. `v1.85.0`, `1.85.0-insider`).
    pub name: String,
    /// Commit the tag points at.
    pub commit_sha: String,
    /// API URL of that commit, when the listing provides one.
    pub commit_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Fork releases
// ---------------------------------------------------------------------------

/// One release from the fork's release listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkRelease {
    pub tag_name: String,
    /// Free-text release notes; may reference the upstream commit.
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl ForkRelease {
    /// Timestamp carried by the release itself: creation, else publication.
    pub fn origin_date(&self) -> DateValue {
        self.created_at
            .as_deref()
            .or(self.published_at.as_deref())
            .filter(|s| !s.trim().is_empty())
            .map(|s| DateValue::Iso(s.to_string()))
            .unwrap_or_default()
    }
}

/// A downloadable file attached to a fork release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    #[serde(rename = "browser_download_url", alias = "download_url")]
    pub download_url: String,
}

// ---------------------------------------------------------------------------
// ParsedVersion
// ---------------------------------------------------------------------------

/// A tag name broken into numeric components and an optional label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    /// Suffix after the `-`, e.g. `insider`.
    pub label: Option<String>,
    /// The tag name exactly as it was given to the parser.
    pub original: String,
}

impl ParsedVersion {
    /// The tag name without its leading `v`.
    ///
    /// Taken from the original text rather than rebuilt from the numbers so
    /// zero-padded components (`1.107.08447-insider`) survive unchanged.
    pub fn normalized(&self) -> String {
        self.original
            .strip_prefix('v')
            .unwrap_or(&self.original)
            .to_string()
    }
}

impl fmt::Display for ParsedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized())
    }
}

// ---------------------------------------------------------------------------
// Channel / Origin / HistoryKind
// ---------------------------------------------------------------------------

/// Release track a build belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Stable,
    Insider,
    /// Any other label (e.g. `rc1`). Never persisted.
    Unclassified,
}

impl Channel {
    /// Quality name understood by the build-metadata provider.
    pub fn quality(self) -> Option<&'static str> {
        match self {
            Self::Stable => Some("stable"),
            Self::Insider => Some("insider"),
            Self::Unclassified => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable => f.write_str("stable"),
            Self::Insider => f.write_str("insider"),
            Self::Unclassified => f.write_str("unclassified"),
        }
    }
}

/// Where a build record was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Origin {
    /// Upstream tag listing.
    TagApi,
    /// Fork release listing.
    Fork,
}

/// One persisted history artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    Stable,
    Insider,
    Fork,
}

impl fmt::Display for HistoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable => f.write_str("stable"),
            Self::Insider => f.write_str("insider"),
            Self::Fork => f.write_str("fork"),
        }
    }
}

impl FromStr for HistoryKind {
    type Err = BuildlineError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "stable" => Ok(Self::Stable),
            "insider" => Ok(Self::Insider),
            "fork" => Ok(Self::Fork),
            other => Err(BuildlineError::validation(format!(
                "unknown history '{other}': expected stable, insider, or fork"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// DateValue
// ---------------------------------------------------------------------------

/// Build timestamp as reported by whichever source supplied it.
///
/// Epoch values come from the metadata provider, ISO strings from release
/// listings. The two are kept apart rather than converted into each other.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateValue {
    /// Milliseconds since the Unix epoch.
    Epoch(i64),
    /// ISO-8601 timestamp string, stored verbatim.
    Iso(String),
    /// No source could date this build. Serialized as `null`.
    #[default]
    Unknown,
}

impl DateValue {
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Best-effort UTC view for display. Never used to rewrite stored values.
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Epoch(ms) => Utc.timestamp_millis_opt(*ms).single(),
            Self::Iso(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for DateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self, self.to_utc()) {
            (Self::Unknown, _) => f.write_str("unknown"),
            (_, Some(dt)) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M UTC")),
            (Self::Epoch(ms), None) => write!(f, "{ms}"),
            (Self::Iso(s), None) => f.write_str(s),
        }
    }
}

// ---------------------------------------------------------------------------
// BuildRecord
// ---------------------------------------------------------------------------

/// A fully resolved build, ready to be ordered and persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildRecord {
    /// Normalized version (no leading `v`).
    pub version: String,
    /// 40-hex commit hash.
    pub commit: String,
    pub date: DateValue,
    pub channel: Channel,
    pub origin: Origin,
    /// Installable assets; only fork records carry these.
    pub assets: Option<AssetMap>,
    /// Parsed components backing `version`, used for ordering.
    pub parsed: ParsedVersion,
}

impl BuildRecord {
    /// Record discovered through the upstream tag listing.
    pub fn from_tag(parsed: ParsedVersion, commit: String, date: DateValue, channel: Channel) -> Self {
        Self {
            version: parsed.normalized(),
            commit,
            date,
            channel,
            origin: Origin::TagApi,
            assets: None,
            parsed,
        }
    }

    /// Record discovered through the fork release listing.
    pub fn from_fork(
        parsed: ParsedVersion,
        commit: String,
        date: DateValue,
        channel: Channel,
        assets: AssetMap,
    ) -> Self {
        Self {
            version: parsed.normalized(),
            commit,
            date,
            channel,
            origin: Origin::Fork,
            assets: Some(assets),
            parsed,
        }
    }

    /// The persisted shape of this record.
    pub fn to_entry(&self) -> HistoryEntry {
        let fork = self.origin == Origin::Fork;
        HistoryEntry {
            version: self.version.clone(),
            commit: self.commit.clone(),
            date: self.date.clone(),
            fork_source: fork,
            assets: if fork { self.assets.clone() } else { None },
        }
    }
}

/// One element of a persisted history artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub version: String,
    pub commit: String,
    #[serde(default)]
    pub date: DateValue,
    /// Marks entries that came from the fork's releases.
    #[serde(rename = "vscodium_src", default, skip_serializing_if = "std::ops::Not::not")]
    pub fork_source: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<AssetMap>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(label: Option<&str>) -> ParsedVersion {
        ParsedVersion {
            major: 1,
            minor: 85,
            patch: 0,
            label: label.map(String::from),
            original: match label {
                Some(l) => format!("v1.85.0-{l}"),
                None => "v1.85.0".into(),
            },
        }
    }

    #[test]
    fn normalized_drops_leading_v() {
        assert_eq!(parsed(None).normalized(), "1.85.0");
        assert_eq!(parsed(Some("insider")).normalized(), "1.85.0-insider");
    }

    #[test]
    fn normalized_keeps_zero_padding() {
        let padded = ParsedVersion {
            major: 1,
            minor: 107,
            patch: 8447,
            label: Some("insider".into()),
            original: "1.107.08447-insider".into(),
        };
        assert_eq!(padded.normalized(), "1.107.08447-insider");
    }

    #[test]
    fn commit_sha_validation() {
        assert!(is_commit_sha("abcdef0123456789abcdef0123456789abcdef01"));
        assert!(!is_commit_sha("abcdef0123"));
        assert!(!is_commit_sha("zzcdef0123456789abcdef0123456789abcdef01"));
    }

    #[test]
    fn date_value_serializes_each_form() {
        assert_eq!(serde_json::to_string(&DateValue::Epoch(1_700_000_000_000)).unwrap(), "1700000000000");
        assert_eq!(
            serde_json::to_string(&DateValue::Iso("2024-01-02T03:04:05Z".into())).unwrap(),
            "\"2024-01-02T03:04:05Z\""
        );
        assert_eq!(serde_json::to_string(&DateValue::Unknown).unwrap(), "null");
    }

    #[test]
    fn date_value_deserializes_each_form() {
        let epoch: DateValue = serde_json::from_str("1700000000000").unwrap();
        assert_eq!(epoch, DateValue::Epoch(1_700_000_000_000));
        let iso: DateValue = serde_json::from_str("\"2024-01-02T03:04:05Z\"").unwrap();
        assert_eq!(iso, DateValue::Iso("2024-01-02T03:04:05Z".into()));
        let unknown: DateValue = serde_json::from_str("null").unwrap();
        assert_eq!(unknown, DateValue::Unknown);
    }

    #[test]
    fn date_value_display() {
        assert_eq!(DateValue::Epoch(0).to_string(), "1970-01-01 00:00 UTC");
        assert_eq!(DateValue::Iso("not a date".into()).to_string(), "not a date");
        assert_eq!(DateValue::Unknown.to_string(), "unknown");
    }

    #[test]
    fn stable_entry_has_no_fork_fields() {
        let record = BuildRecord::from_tag(
            parsed(None),
            "a".repeat(40),
            DateValue::Epoch(1),
            Channel::Stable,
        );
        let json = serde_json::to_value(record.to_entry()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "version": "1.85.0", "commit": "a".repeat(40), "date": 1 })
        );
    }

    #[test]
    fn fork_entry_carries_marker_and_assets() {
        let mut assets = AssetMap::new();
        assets.insert("darwin_arm64".into(), "https://dl.example.com/a.zip".into());
        let record = BuildRecord::from_fork(
            parsed(Some("insider")),
            "b".repeat(40),
            DateValue::Iso("2024-01-02T03:04:05Z".into()),
            Channel::Insider,
            assets,
        );
        let json = serde_json::to_value(record.to_entry()).unwrap();
        assert_eq!(json["vscodium_src"], true);
        assert_eq!(json["assets"]["darwin_arm64"], "https://dl.example.com/a.zip");
        assert_eq!(json["date"], "2024-01-02T03:04:05Z");
    }

    #[test]
    fn entry_without_date_key_is_unknown() {
        let entry: HistoryEntry =
            serde_json::from_str(r#"{"version":"1.0.0","commit":"abc"}"#).unwrap();
        assert_eq!(entry.date, DateValue::Unknown);
        assert!(!entry.fork_source);
    }

    #[test]
    fn fork_release_origin_date_prefers_creation() {
        let json = r#"{
            "tag_name": "1.107.18537-insider",
            "body": "Update vscode to abc",
            "created_at": "2025-12-01T10:00:00Z",
            "published_at": "2025-12-01T11:00:00Z",
            "assets": [{ "name": "a.zip", "browser_download_url": "https://dl/a.zip" }]
        }"#;
        let release: ForkRelease = serde_json::from_str(json).unwrap();
        assert_eq!(release.origin_date(), DateValue::Iso("2025-12-01T10:00:00Z".into()));
        assert_eq!(release.assets[0].download_url, "https://dl/a.zip");

        let bare: ForkRelease = serde_json::from_str(r#"{"tag_name":"x"}"#).unwrap();
        assert_eq!(bare.origin_date(), DateValue::Unknown);
        assert!(bare.assets.is_empty());
    }

    #[test]
    fn history_kind_parses() {
        assert_eq!("fork".parse::<HistoryKind>().unwrap(), HistoryKind::Fork);
        assert!("nightly".parse::<HistoryKind>().is_err());
    }
}
