//! Release asset → platform bucket mapping.

use buildline_shared::{AssetMap, ReleaseAsset};

/// Extensions of installable archives. Installers, checksums and signatures
/// are ignored.
const ARCHIVE_EXTENSIONS: &[&str] = &[".zip", ".tar.gz"];

/// Marker of remote-extension-host server builds, compared lowercased.
const REMOTE_HOST_MARKER: &str = "reh-";

/// Filename substring → bucket key, tried in order; first match wins.
const PLATFORM_BUCKETS: &[(&str, &str)] = &[
    ("darwin-arm64", "darwin_arm64"),
    ("darwin-x64", "darwin_x64"),
    ("linux-arm64", "linux_arm64"),
    ("linux-x64", "linux_x64"),
    ("win32-arm64", "win32_arm64"),
    ("win32-x64", "win32_x64"),
];

/// Bucket for a single asset filename, if it is an installable archive.
pub fn platform_bucket(name: &str) -> Option<&'static str> {
    if !ARCHIVE_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
        return None;
    }
    if is_remote_host_build(name) {
        return None;
    }
    PLATFORM_BUCKETS
        .iter()
        .find(|(needle, _)| name.contains(needle))
        .map(|(_, bucket)| *bucket)
}

fn is_remote_host_build(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.starts_with(REMOTE_HOST_MARKER) || lower.contains(&format!("-{REMOTE_HOST_MARKER}"))
}

/// Map a release's assets into platform buckets.
///
/// A later asset for the same bucket replaces an earlier one. An empty map
/// means the release has nothing installable.
pub fn map_assets(assets: &[ReleaseAsset]) -> AssetMap {
    let mut mapped = AssetMap::new();
    for asset in assets {
        if let Some(bucket) = platform_bucket(&asset.name) {
            mapped.insert(bucket.to_string(), asset.download_url.clone());
        }
    }
    mapped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(name: &str) -> ReleaseAsset {
        ReleaseAsset {
            name: name.into(),
            download_url: format!("https://dl.example.com/{name}"),
        }
    }

    #[test]
    fn buckets_for_each_platform() {
        let cases = [
            ("VSCodium-darwin-arm64-1.107.18537-insider.zip", "darwin_arm64"),
            ("VSCodium-darwin-x64-1.107.18537-insider.zip", "darwin_x64"),
            ("VSCodium-linux-arm64-1.107.18537-insider.tar.gz", "linux_arm64"),
            ("VSCodium-linux-x64-1.107.18537-insider.tar.gz", "linux_x64"),
            ("VSCodium-win32-arm64-1.107.18537-insider.zip", "win32_arm64"),
            ("VSCodium-win32-x64-1.107.18537-insider.zip", "win32_x64"),
        ];
        for (name, bucket) in cases {
            assert_eq!(platform_bucket(name), Some(bucket), "{name}");
        }
    }

    #[test]
    fn non_archives_ignored() {
        assert_eq!(platform_bucket("VSCodium-darwin-arm64-1.107.0.dmg"), None);
        assert_eq!(platform_bucket("VSCodium-win32-x64-1.107.0.zip.sha256"), None);
        assert_eq!(platform_bucket("VSCodiumUserSetup-win32-x64-1.107.0.exe"), None);
    }

    #[test]
    fn unknown_platforms_ignored() {
        assert_eq!(platform_bucket("VSCodium-linux-armhf-1.107.0.tar.gz"), None);
    }

    #[test]
    fn remote_host_builds_excluded_in_any_case() {
        assert_eq!(platform_bucket("vscodium-reh-linux-x64-1.107.0.tar.gz"), None);
        assert_eq!(platform_bucket("VSCodium-REH-darwin-arm64-1.107.0.tar.gz"), None);
        assert_eq!(platform_bucket("vscodium-reh-web-win32-x64-1.107.0.tar.gz"), None);
        assert_eq!(platform_bucket("reh-linux-arm64.tar.gz"), None);
    }

    #[test]
    fn map_keeps_last_duplicate() {
        let assets = vec![
            ReleaseAsset {
                name: "A-linux-x64-1.tar.gz".into(),
                download_url: "https://first".into(),
            },
            ReleaseAsset {
                name: "B-linux-x64-1.tar.gz".into(),
                download_url: "https://second".into(),
            },
        ];
        let mapped = map_assets(&assets);
        assert_eq!(mapped.len(), 1);
        assert_eq!(mapped["linux_x64"], "https://second");
    }

    #[test]
    fn map_skips_excluded_and_keeps_rest() {
        let mapped = map_assets(&[
            asset("vscodium-reh-darwin-arm64-1.0.0.tar.gz"),
            asset("VSCodium-darwin-arm64-1.0.0.zip"),
            asset("VSCodium-1.0.0.src.tar.gz"),
        ]);
        assert_eq!(mapped.len(), 1);
        assert_eq!(
            mapped["darwin_arm64"],
            "https://dl.example.com/VSCodium-darwin-arm64-1.0.0.zip"
        );
    }

    #[test]
    fn nothing_installable_is_empty() {
        assert!(map_assets(&[asset("checksums.txt")]).is_empty());
        assert!(map_assets(&[]).is_empty());
    }
}
