use buildline_shared::{Channel, ParsedVersion};

/// Label that marks a pre-release build.
const INSIDER_LABEL: &str = "insider";

/// Map a parsed version to its release channel.
///
/// No label is stable, `insider` is insider, and every other label
/// (release candidates, nightlies, ...) is [`Channel::Unclassified`], which
/// callers drop.
pub fn classify(version: &ParsedVersion) -> Channel {
    match version.label.as_deref() {
        None => Channel::Stable,
        Some(INSIDER_LABEL) => Channel::Insider,
        Some(_) => Channel::Unclassified,
    }
}
