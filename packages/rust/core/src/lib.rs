//! Run orchestration for buildline.
//!
//! Ties the sources, the version rules and the history store together into
//! the three runs the CLI exposes: upstream tags, fork releases and the
//! insider patch scan.

pub mod fork;
pub mod pipeline;
pub mod scan;

pub use fork::run_fork;
pub use pipeline::{
    PersistOutcome, ProgressReporter, RunReport, SilentProgress, UpstreamOptions, run_upstream,
};
pub use scan::{DEFAULT_SERIES, ScanSeries, run_insider_scan};
