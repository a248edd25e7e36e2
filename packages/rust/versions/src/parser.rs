//! Tag name parser.
//!
//! Accepted grammar, after dropping one leading `v`:
//! `MAJOR.MINOR.PATCH` optionally followed by `-LABEL`, where the numbers are
//! decimal and the label is alphanumeric. Anything else is not a release tag.

use std::sync::LazyLock;

use buildline_shared::{ParsedVersion, SYNTHETIC_MAJOR_FLOOR};
use regex::Regex;

/// `1.85.0` or `1.85.0-insider`.
static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\.(\d+)\.(\d+)(?:-([a-zA-Z0-9]+))?$").expect("version regex")
});

/// Parse a raw tag name into a [`ParsedVersion`].
///
/// Returns `None` for malformed names and for synthetic tags whose major
/// version is at or above [`SYNTHETIC_MAJOR_FLOOR`] (e.g. `1000.0.0`).
/// Neither case is an error; such tags are simply not builds.
pub fn parse(tag_name: &str) -> Option<ParsedVersion> {
    let clean = tag_name.strip_prefix('v').unwrap_or(tag_name);
    let caps = VERSION_RE.captures(clean)?;

    let major: u32 = caps[1].parse().ok()?;
    let minor: u32 = caps[2].parse().ok()?;
    let patch: u32 = caps[3].parse().ok()?;

    if major >= SYNTHETIC_MAJOR_FLOOR {
        tracing::trace!(tag = tag_name, major, "synthetic tag excluded");
        return None;
    }

    Some(ParsedVersion {
        major,
        minor,
        patch,
        label: caps.get(4).map(|m| m.as_str().to_string()),
        original: tag_name.to_string(),
    })
}

/// Whether `version` is already in normalized record form (no `v`).
pub fn is_release_version(version: &str) -> bool {
    !version.starts_with('v') && parse(version).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stable_tag() {
        let v = parse("1.85.0").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (1, 85, 0));
        assert!(v.label.is_none());
        assert_eq!(v.original, "1.85.0");
    }

    #[test]
    fn parses_labelled_tag_with_v_prefix() {
        let v = parse("v1.85.0-insider").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (1, 85, 0));
        assert_eq!(v.label.as_deref(), Some("insider"));
        assert_eq!(v.original, "v1.85.0-insider");
        assert_eq!(v.normalized(), "1.85.0-insider");
    }

    #[test]
    fn reconstruction_matches_input_without_v() {
        for tag in ["v0.10.1", "1.0.0", "v1.85.2-insider", "2.3.4-rc1", "0.0.0"] {
            let v = parse(tag).unwrap();
            let rebuilt = match &v.label {
                Some(l) => format!("{}.{}.{}-{l}", v.major, v.minor, v.patch),
                None => format!("{}.{}.{}", v.major, v.minor, v.patch),
            };
            assert_eq!(rebuilt, tag.trim_start_matches('v'));
            assert_eq!(v.normalized(), rebuilt);
        }
    }

    #[test]
    fn rejects_malformed_names() {
        for tag in [
            "",
            "v",
            "1.85",
            "1.85.0.1",
            "release-1.85.0",
            "1.85.0-",
            "1.85.0-insider.1",
            "1.85.0-in sider",
            "1.85.x",
            "vv1.85.0",
            " 1.85.0",
        ] {
            assert!(parse(tag).is_none(), "expected {tag:?} to be rejected");
        }
    }

    #[test]
    fn rejects_synthetic_majors() {
        assert!(parse("900.0.0").is_none());
        assert!(parse("v1000.1.2-insider").is_none());
        assert!(parse("899.0.0").is_some());
    }

    #[test]
    fn rejects_overflowing_components() {
        assert!(parse("1.99999999999.0").is_none());
    }

    #[test]
    fn release_version_form() {
        assert!(is_release_version("1.107.18537-insider"));
        assert!(!is_release_version("v1.0.0"));
        assert!(!is_release_version("nightly"));
    }
}
