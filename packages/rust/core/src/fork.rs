//! Fork pipeline: releases → dedup/assets → commit lookup → sort → persist.

use std::time::Instant;

use tracing::{info, instrument, warn};

use buildline_fork::{Deduplicator, select_releases};
use buildline_shared::{BuildRecord, Channel, FetchConfig, HistoryKind, Result};
use buildline_sources::{LookupKey, MetadataResolver, ReleaseLister, resolve_date};
use buildline_storage::HistoryStore;
use buildline_versions::sort_history;

use crate::pipeline::{ProgressReporter, RunReport, Throttle, persist_history};

/// Build the fork history from the fork's release listing.
///
/// Each kept release is dated by looking its upstream commit up in the
/// insider metadata, falling back to the release's own timestamps.
#[instrument(skip_all, fields(repo = %config.fork_repo_id))]
pub async fn run_fork(
    config: &FetchConfig,
    store: &HistoryStore,
    progress: &dyn ProgressReporter,
) -> Result<RunReport> {
    let start = Instant::now();
    let mut report = RunReport::default();

    progress.phase("Listing fork releases");
    let listing = ReleaseLister::new(config)?
        .fetch_releases(&config.fork_repo_id)
        .await;
    report.listed = listing.items.len();
    report.listing_complete = listing.is_complete();

    let mut dedup = Deduplicator::new();
    let (candidates, stats) = select_releases(&listing.items, &mut dedup);
    report.excluded = stats.examined - stats.kept;
    info!(
        examined = stats.examined,
        kept = stats.kept,
        no_commit = stats.no_upstream_commit,
        duplicates = stats.duplicate_commit,
        unparseable = stats.unparseable_tag,
        no_assets = stats.no_assets,
        unique_commits = dedup.len(),
        "fork releases selected"
    );
    if dedup.is_empty() && stats.examined > 0 {
        warn!("no fork release could be attributed to an upstream commit");
    }

    progress.phase("Resolving fork commits");
    let resolver = MetadataResolver::new(config)?;
    let mut throttle = Throttle::new(config);
    let total = candidates.len();
    let mut records = Vec::with_capacity(total);

    for (i, c) in candidates.into_iter().enumerate() {
        let key = LookupKey::Commit(c.commit.clone());
        progress.lookup(&c.parsed.normalized(), i + 1, total);

        let meta = resolver.resolve(&key, Channel::Insider).await;
        let date = resolve_date(meta.as_ref(), &c.origin_date);
        report.tally(&date, meta.as_ref().is_some_and(|m| m.timestamp.is_known()));

        records.push(BuildRecord::from_fork(
            c.parsed, c.commit, date, c.channel, c.assets,
        ));
        throttle.lookup_done(i + 1 == total).await;
    }
    report.pauses = throttle.pauses();

    progress.phase("Writing history");
    sort_history(&mut records);
    report
        .histories
        .push(persist_history(store, HistoryKind::Fork, &records).await?);

    report.elapsed = start.elapsed();
    info!(
        records = records.len(),
        resolved = report.resolved,
        fallback = report.fallback_dated,
        "fork run complete"
    );
    progress.done(&report);
    Ok(report)
}
