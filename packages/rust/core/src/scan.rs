//! Insider patch scan.
//!
//! Recovers insider builds that have no tag by probing the metadata provider
//! for `major.minor.patch-insider` directly. Each minor is walked from patch 0
//! until the first miss; a series ends after a run of empty minors.

use std::time::Instant;

use tracing::{debug, info, instrument};

use buildline_shared::{BuildRecord, Channel, FetchConfig, HistoryKind, Result, is_commit_sha};
use buildline_sources::{LookupKey, MetadataResolver};
use buildline_storage::HistoryStore;
use buildline_versions::sort_history;

use crate::pipeline::{ProgressReporter, RunReport, Throttle, persist_history};

/// One major version line to walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSeries {
    pub major: u32,
    pub first_minor: u32,
    /// Consecutive minors without any build before the series is abandoned.
    pub max_empty_minors: u32,
}

/// The 0.x line from 0.10, then the 1.x line.
pub const DEFAULT_SERIES: [ScanSeries; 2] = [
    ScanSeries {
        major: 0,
        first_minor: 10,
        max_empty_minors: 5,
    },
    ScanSeries {
        major: 1,
        first_minor: 0,
        max_empty_minors: 10,
    },
];

/// Probe every series and persist what was found as the insider history.
#[instrument(skip_all, fields(series = series.len()))]
pub async fn run_insider_scan(
    config: &FetchConfig,
    store: &HistoryStore,
    series: &[ScanSeries],
    progress: &dyn ProgressReporter,
) -> Result<RunReport> {
    let start = Instant::now();
    let mut report = RunReport {
        listing_complete: true,
        ..RunReport::default()
    };

    let resolver = MetadataResolver::new(config)?;
    let mut throttle = Throttle::new(config);
    let mut records = Vec::new();

    for s in series {
        progress.phase(&format!("Scanning {}.x insiders", s.major));
        let mut minor = s.first_minor;
        let mut empty_run = 0;

        while empty_run < s.max_empty_minors {
            let found = scan_minor(&resolver, &mut throttle, s.major, minor, &mut report, progress).await;
            if found.is_empty() {
                empty_run += 1;
            } else {
                debug!(major = s.major, minor, builds = found.len(), "minor scanned");
                empty_run = 0;
                records.extend(found);
            }
            minor += 1;
        }
        info!(major = s.major, last_minor = minor - 1, "series exhausted");
    }

    report.pauses = throttle.pauses();
    sort_history(&mut records);
    report
        .histories
        .push(persist_history(store, HistoryKind::Insider, &records).await?);

    report.elapsed = start.elapsed();
    info!(
        probes = report.listed,
        found = records.len(),
        "insider scan complete"
    );
    progress.done(&report);
    Ok(report)
}

async fn scan_minor(
    resolver: &MetadataResolver,
    throttle: &mut Throttle,
    major: u32,
    minor: u32,
    report: &mut RunReport,
    progress: &dyn ProgressReporter,
) -> Vec<BuildRecord> {
    let mut found = Vec::new();

    for patch in 0.. {
        let version = format!("{major}.{minor}.{patch}-insider");
        report.listed += 1;
        progress.lookup(&version, report.listed, 0);

        let meta = resolver
            .resolve(&LookupKey::Version(version.clone()), Channel::Insider)
            .await;
        throttle.lookup_done(false).await;
        let Some(meta) = meta else {
            break;
        };

        let Some(parsed) = buildline_versions::parse(&version) else {
            break;
        };
        if !is_commit_sha(&meta.canonical_commit) {
            debug!(%version, commit = %meta.canonical_commit, "provider returned no usable commit");
            report.excluded += 1;
            continue;
        }

        report.tally(&meta.timestamp, true);
        found.push(BuildRecord::from_tag(
            parsed,
            meta.canonical_commit,
            meta.timestamp,
            Channel::Insider,
        ));
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::SilentProgress;
    use buildline_shared::{DateValue, OutputConfig};
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_store() -> HistoryStore {
        let dir = std::env::temp_dir().join(format!("buildline_scan_{}", Uuid::now_v7()));
        HistoryStore::new(OutputConfig {
            dir: dir.to_string_lossy().into_owned(),
            ..OutputConfig::default()
        })
    }

    async fn mount_build(server: &MockServer, version: &str, c: char, ts: i64) {
        Mock::given(method("GET"))
            .and(path(format!("/api/versions/{version}/darwin/insider")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "version": c.to_string().repeat(40),
                "timestamp": ts,
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn walks_patches_and_minors() {
        let server = MockServer::start().await;
        mount_build(&server, "1.0.0-insider", 'a', 10).await;
        mount_build(&server, "1.0.1-insider", 'b', 20).await;
        mount_build(&server, "1.2.0-insider", 'c', 30).await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(5)
            .mount(&server)
            .await;

        let series = [ScanSeries {
            major: 1,
            first_minor: 0,
            max_empty_minors: 2,
        }];
        let store = test_store();
        let report = run_insider_scan(
            &FetchConfig::for_base_url(&server.uri()),
            &store,
            &series,
            &SilentProgress,
        )
        .await
        .unwrap();

        // 1.0.0 1.0.1 1.0.2 | 1.1.0 | 1.2.0 1.2.1 | 1.3.0 | 1.4.0
        assert_eq!(report.listed, 8);
        assert_eq!(report.resolved, 3);

        let insider = store.load(HistoryKind::Insider).await.unwrap();
        let versions: Vec<_> = insider.iter().map(|e| e.version.as_str()).collect();
        assert_eq!(versions, ["1.0.0-insider", "1.0.1-insider", "1.2.0-insider"]);
        assert_eq!(insider[2].commit, "c".repeat(40));
        assert_eq!(insider[2].date, DateValue::Epoch(30));
    }

    #[tokio::test]
    async fn nothing_found_refuses_write() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let series = [ScanSeries {
            major: 0,
            first_minor: 10,
            max_empty_minors: 3,
        }];
        let store = test_store();
        let report = run_insider_scan(
            &FetchConfig::for_base_url(&server.uri()),
            &store,
            &series,
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(report.listed, 3);
        assert_eq!(report.refused(), vec![HistoryKind::Insider]);
    }

    #[tokio::test]
    async fn misses_count_towards_politeness_batches() {
        let server = MockServer::start().await;
        mount_build(&server, "1.0.0-insider", 'a', 10).await;
        mount_build(&server, "1.1.0-insider", 'b', 20).await;
        mount_build(&server, "1.2.0-insider", 'c', 30).await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(4)
            .mount(&server)
            .await;

        let mut config = FetchConfig::for_base_url(&server.uri());
        config.politeness_delay = std::time::Duration::from_millis(20);
        config.politeness_batch = 2;

        let series = [ScanSeries {
            major: 1,
            first_minor: 0,
            max_empty_minors: 1,
        }];
        let report = run_insider_scan(&config, &test_store(), &series, &SilentProgress)
            .await
            .unwrap();

        // 1.0.0 1.0.1 | 1.1.0 1.1.1 | 1.2.0 1.2.1 | 1.3.0
        assert_eq!(report.listed, 7);
        assert_eq!(report.resolved, 3);
        assert_eq!(report.pauses, 3);
        assert!(report.elapsed >= config.politeness_delay * 3);
    }

    #[test]
    fn default_series_bounds() {
        assert_eq!(DEFAULT_SERIES[0].first_minor, 10);
        assert_eq!(DEFAULT_SERIES[0].max_empty_minors, 5);
        assert_eq!(DEFAULT_SERIES[1].max_empty_minors, 10);
    }
}
