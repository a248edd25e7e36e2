//! Version parsing, channel classification, and history ordering.
//!
//! Everything here is pure: no I/O, no clock. The network crates feed raw tag
//! names in; the pipeline gets back parsed versions, channels, and a total
//! order over build records.

mod channel;
mod order;
mod parser;

pub use channel::classify;
pub use order::{HistoryKey, channel_tie_break, history_key, merge_histories, sort_history};
pub use parser::{is_release_version, parse};
