//! Upstream pipeline: tags → parse → classify → metadata → sort → persist.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use buildline_shared::{
    BuildRecord, BuildlineError, Channel, DateValue, FetchConfig, HistoryKind, ParsedVersion,
    RawTag, Result,
};
use buildline_sources::{
    DiscoveryWindow, LookupKey, MetadataResolver, RetentionStatus, TagFetcher, resolve_date,
};
use buildline_storage::HistoryStore;
use buildline_versions::sort_history;

// ---------------------------------------------------------------------------
// Progress & reporting
// ---------------------------------------------------------------------------

/// Progress callback for long sequential runs.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before each per-build lookup.
    fn lookup(&self, key: &str, current: usize, total: usize);
    /// Called when the run completes.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn lookup(&self, _key: &str, _current: usize, _total: usize) {}
    fn done(&self, _report: &RunReport) {}
}

/// What happened to one history at the persist boundary.
#[derive(Debug, Clone)]
pub struct PersistOutcome {
    pub history: HistoryKind,
    pub records: usize,
    /// `None` when the write was refused because the result was empty.
    pub path: Option<PathBuf>,
}

impl PersistOutcome {
    pub fn refused(&self) -> bool {
        self.path.is_none()
    }
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Tags, releases or probes examined.
    pub listed: usize,
    /// `false` when the listing stopped on a failure and is partial.
    pub listing_complete: bool,
    /// Dropped before resolution (malformed, synthetic, unclassified,
    /// duplicate or without assets).
    pub excluded: usize,
    /// Dated from live metadata.
    pub resolved: usize,
    /// Dated from the origin's own timestamp.
    pub fallback_dated: usize,
    pub undated: usize,
    /// Insider builds outside the discovery window whose lookup failed.
    pub unrecoverable: usize,
    /// Politeness sleeps taken between lookups.
    pub pauses: usize,
    pub histories: Vec<PersistOutcome>,
    pub elapsed: Duration,
}

impl RunReport {
    /// Histories whose write was refused.
    pub fn refused(&self) -> Vec<HistoryKind> {
        self.histories
            .iter()
            .filter(|h| h.refused())
            .map(|h| h.history)
            .collect()
    }

    /// Fold a second run into this one (used by `all`).
    pub fn absorb(&mut self, other: RunReport) {
        self.listed += other.listed;
        self.listing_complete &= other.listing_complete;
        self.excluded += other.excluded;
        self.resolved += other.resolved;
        self.fallback_dated += other.fallback_dated;
        self.undated += other.undated;
        self.unrecoverable += other.unrecoverable;
        self.pauses += other.pauses;
        self.histories.extend(other.histories);
        self.elapsed += other.elapsed;
    }

    pub(crate) fn tally(&mut self, date: &DateValue, live: bool) {
        match (live, date.is_known()) {
            (true, true) => self.resolved += 1,
            (false, true) => self.fallback_dated += 1,
            _ => self.undated += 1,
        }
    }
}

/// Persist one history, turning a refused empty write into a report entry.
///
/// Any other storage failure is returned as an error.
pub(crate) async fn persist_history(
    store: &HistoryStore,
    kind: HistoryKind,
    records: &[BuildRecord],
) -> Result<PersistOutcome> {
    match store.persist(kind, records).await {
        Ok(path) => Ok(PersistOutcome {
            history: kind,
            records: records.len(),
            path: Some(path),
        }),
        Err(BuildlineError::EmptyHistory { .. }) => {
            warn!(history = %kind, "no records, existing artifact left untouched");
            Ok(PersistOutcome {
                history: kind,
                records: 0,
                path: None,
            })
        }
        Err(e) => Err(e),
    }
}

/// Counts issued lookups and sleeps after every `politeness_batch` of them.
pub(crate) struct Throttle {
    delay: Duration,
    batch: usize,
    issued: usize,
    pauses: usize,
}

impl Throttle {
    pub(crate) fn new(config: &FetchConfig) -> Self {
        Self {
            delay: config.politeness_delay,
            batch: config.politeness_batch.max(1) as usize,
            issued: 0,
            pauses: 0,
        }
    }

    /// Record one lookup, hit or miss. No pause after the `last` one.
    pub(crate) async fn lookup_done(&mut self, last: bool) {
        self.issued += 1;
        if self.issued % self.batch == 0 && !last && !self.delay.is_zero() {
            debug!(
                issued = self.issued,
                delay_ms = self.delay.as_millis() as u64,
                "politeness pause"
            );
            self.pauses += 1;
            tokio::time::sleep(self.delay).await;
        }
    }

    pub(crate) fn pauses(&self) -> usize {
        self.pauses
    }
}

// ---------------------------------------------------------------------------
// Upstream
// ---------------------------------------------------------------------------

/// Options for [`run_upstream`].
#[derive(Debug, Clone, Copy)]
pub struct UpstreamOptions {
    /// Look up each build's date; `false` writes tags-only histories.
    pub resolve_metadata: bool,
}

impl Default for UpstreamOptions {
    fn default() -> Self {
        Self {
            resolve_metadata: true,
        }
    }
}

struct Candidate {
    parsed: ParsedVersion,
    channel: Channel,
    tag: RawTag,
}

/// Build the stable and insider histories from the upstream tag listing.
///
/// Per-build failures only degrade that build's date. Each history is
/// persisted independently; an empty one is refused and shows up in
/// [`RunReport::refused`].
#[instrument(skip_all, fields(repo = %config.repo_id))]
pub async fn run_upstream(
    config: &FetchConfig,
    store: &HistoryStore,
    options: UpstreamOptions,
    progress: &dyn ProgressReporter,
) -> Result<RunReport> {
    let start = Instant::now();
    let mut report = RunReport::default();

    // --- Phase 1: Tags ---
    progress.phase("Listing tags");
    let listing = TagFetcher::new(config)?.fetch_all_tags(&config.repo_id).await;
    report.listed = listing.items.len();
    report.listing_complete = listing.is_complete();

    // --- Phase 2: Parse & classify ---
    let mut candidates = Vec::new();
    for tag in listing.items {
        let Some(parsed) = buildline_versions::parse(&tag.name) else {
            report.excluded += 1;
            continue;
        };
        let channel = buildline_versions::classify(&parsed);
        if channel == Channel::Unclassified {
            debug!(tag = %tag.name, "unclassified label, dropping");
            report.excluded += 1;
            continue;
        }
        candidates.push(Candidate {
            parsed,
            channel,
            tag,
        });
    }
    info!(
        candidates = candidates.len(),
        excluded = report.excluded,
        "tags classified"
    );

    // --- Phase 3: Metadata ---
    let mut stable = Vec::new();
    let mut insider = Vec::new();

    if options.resolve_metadata {
        progress.phase("Resolving build metadata");
        let resolver = MetadataResolver::new(config)?;
        let window = resolver.discovery_window(Channel::Insider).await;
        let mut throttle = Throttle::new(config);
        let total = candidates.len();

        for (i, c) in candidates.into_iter().enumerate() {
            let version = c.parsed.normalized();
            progress.lookup(&version, i + 1, total);

            let meta = resolver
                .resolve(&LookupKey::Version(version.clone()), c.channel)
                .await;
            if meta.is_none() && is_pruned(c.channel, &c.tag.commit_sha, window.as_ref()) {
                debug!(%version, commit = %c.tag.commit_sha, "insider build pruned by provider");
                report.unrecoverable += 1;
            }

            let date = resolve_date(meta.as_ref(), &DateValue::Unknown);
            report.tally(&date, meta.is_some());
            push_record(&mut stable, &mut insider, c, date);

            throttle.lookup_done(i + 1 == total).await;
        }
        report.pauses = throttle.pauses();
    } else {
        for c in candidates {
            report.undated += 1;
            push_record(&mut stable, &mut insider, c, DateValue::Unknown);
        }
    }

    if report.unrecoverable > 0 {
        warn!(
            count = report.unrecoverable,
            "insider builds outside the discovery window cannot be dated"
        );
    }

    // --- Phase 4: Order & persist ---
    progress.phase("Writing histories");
    sort_history(&mut stable);
    sort_history(&mut insider);
    report
        .histories
        .push(persist_history(store, HistoryKind::Stable, &stable).await?);
    report
        .histories
        .push(persist_history(store, HistoryKind::Insider, &insider).await?);

    report.elapsed = start.elapsed();
    info!(
        stable = stable.len(),
        insider = insider.len(),
        resolved = report.resolved,
        undated = report.undated,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "upstream run complete"
    );
    progress.done(&report);
    Ok(report)
}

fn is_pruned(channel: Channel, commit: &str, window: Option<&DiscoveryWindow>) -> bool {
    channel == Channel::Insider
        && window.is_some_and(|w| !RetentionStatus::classify(commit, w).is_recoverable())
}

fn push_record(
    stable: &mut Vec<BuildRecord>,
    insider: &mut Vec<BuildRecord>,
    c: Candidate,
    date: DateValue,
) {
    let record = BuildRecord::from_tag(c.parsed, c.tag.commit_sha, date, c.channel);
    match c.channel {
        Channel::Stable => stable.push(record),
        Channel::Insider => insider.push(record),
        Channel::Unclassified => {}
    }
}
