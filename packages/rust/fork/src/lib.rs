//! Fork release reconciliation.
//!
//! A fork republishes upstream builds under its own tags. Its release notes
//! name the upstream commit each release was built from; this crate pulls
//! that commit out, collapses repeated releases of the same commit, and maps
//! release assets to platform buckets. All functions are pure.

mod assets;
mod commit;
mod dedup;

pub use assets::{map_assets, platform_bucket};
pub use commit::extract_upstream_commit;
pub use dedup::{Deduplicator, ForkCandidate, SelectionStats, select_releases};
