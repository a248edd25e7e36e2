//! Remote sources: upstream tag listing, fork release listing and the
//! build-metadata provider.

mod client;
pub mod metadata;
pub mod releases;
pub mod tags;

pub use client::{Listing, ListingStop};
pub use metadata::{
    BuildMetadata, DISCOVERY_CAP, DiscoveryWindow, LookupKey, MetadataResolver, RetentionStatus,
    resolve_date,
};
pub use releases::ReleaseLister;
pub use tags::TagFetcher;
