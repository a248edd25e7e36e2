//! Fork release selection: attribute each release to an upstream commit and
//! keep one release per commit.

use std::collections::HashSet;

use buildline_shared::{AssetMap, Channel, DateValue, ForkRelease, ParsedVersion};
use tracing::debug;

use crate::assets::map_assets;
use crate::commit::extract_upstream_commit;

/// Tracks which upstream commits already have a fork entry.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_seen(&self, commit: &str) -> bool {
        self.seen.contains(commit)
    }

    /// Record `commit`. Returns `false` if it was already recorded.
    pub fn admit(&mut self, commit: &str) -> bool {
        self.seen.insert(commit.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// A fork release that survived selection, not yet dated.
#[derive(Debug, Clone, PartialEq)]
pub struct ForkCandidate {
    pub parsed: ParsedVersion,
    pub channel: Channel,
    /// Upstream commit named in the release notes.
    pub commit: String,
    pub assets: AssetMap,
    /// The release's own timestamp, used when upstream metadata is unavailable.
    pub origin_date: DateValue,
}

/// Why releases were left out, for the run report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionStats {
    pub examined: usize,
    pub no_upstream_commit: usize,
    pub duplicate_commit: usize,
    pub unparseable_tag: usize,
    pub no_assets: usize,
    pub kept: usize,
}

/// Pick the releases that make up the fork history.
///
/// Releases are taken in listing order, which is assumed newest-first: the
/// first release naming a commit wins. A commit is only recorded once a
/// release for it is actually kept, so a release without installable assets
/// does not shadow a later one for the same commit.
pub fn select_releases(
    releases: &[ForkRelease],
    dedup: &mut Deduplicator,
) -> (Vec<ForkCandidate>, SelectionStats) {
    let mut stats = SelectionStats::default();
    let mut kept = Vec::new();

    for release in releases {
        stats.examined += 1;

        let Some(commit) = release.body.as_deref().and_then(extract_upstream_commit) else {
            debug!(tag = %release.tag_name, "no upstream commit in release notes");
            stats.no_upstream_commit += 1;
            continue;
        };

        if dedup.is_seen(&commit) {
            debug!(tag = %release.tag_name, %commit, "commit already covered by a newer release");
            stats.duplicate_commit += 1;
            continue;
        }

        let Some(parsed) = buildline_versions::parse(&release.tag_name) else {
            debug!(tag = %release.tag_name, "release tag is not a version");
            stats.unparseable_tag += 1;
            continue;
        };
        let channel = buildline_versions::classify(&parsed);
        if channel == Channel::Unclassified {
            debug!(tag = %release.tag_name, "release label is neither stable nor insider");
            stats.unparseable_tag += 1;
            continue;
        }

        let assets = map_assets(&release.assets);
        if assets.is_empty() {
            debug!(tag = %release.tag_name, "release has no installable assets");
            stats.no_assets += 1;
            continue;
        }

        dedup.admit(&commit);
        stats.kept += 1;
        kept.push(ForkCandidate {
            parsed,
            channel,
            commit,
            assets,
            origin_date: release.origin_date(),
        });
    }

    (kept, stats)
}
