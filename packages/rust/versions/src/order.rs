//! Channel-aware total order over build records.

use buildline_shared::{BuildRecord, Channel};

/// Sort key: `(major, minor, patch, channel tie-break)`.
pub type HistoryKey = (u32, u32, u32, i8);

/// Insider builds preview the stable release of the same number, so they
/// sort just before it.
pub fn channel_tie_break(channel: Channel) -> i8 {
    match channel {
        Channel::Stable => 0,
        Channel::Insider | Channel::Unclassified => -1,
    }
}

/// Ordering key for one record.
pub fn history_key(record: &BuildRecord) -> HistoryKey {
    let v = &record.parsed;
    (v.major, v.minor, v.patch, channel_tie_break(record.channel))
}

/// Sort oldest-to-newest in place.
///
/// `sort_by_key` is stable, so records with equal keys keep their input order.
pub fn sort_history(records: &mut [BuildRecord]) {
    records.sort_by_key(history_key);
}

/// Interleave several histories into one oldest-to-newest sequence.
pub fn merge_histories<I>(histories: I) -> Vec<BuildRecord>
where
    I: IntoIterator<Item = Vec<BuildRecord>>,
{
    let mut merged: Vec<BuildRecord> = histories.into_iter().flatten().collect();
    sort_history(&mut merged);
    merged
}
