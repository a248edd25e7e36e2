//! JSON history artifacts.
//!
//! The [`HistoryStore`] writes one JSON array per history. An empty result
//! never replaces an existing artifact: [`HistoryStore::persist`] refuses it
//! and leaves whatever is on disk untouched, so a failed upstream call cannot
//! wipe a history.

use std::path::{Path, PathBuf};

use buildline_shared::{BuildRecord, BuildlineError, HistoryEntry, HistoryKind, OutputConfig, Result};
use tracing::{info, instrument, warn};

/// Reads and writes the history artifacts under the configured output dir.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    output: OutputConfig,
}

impl HistoryStore {
    pub fn new(output: OutputConfig) -> Self {
        Self { output }
    }

    /// Where `kind` is stored.
    pub fn path(&self, kind: HistoryKind) -> PathBuf {
        self.output.path_for(kind)
    }

    /// Replace the `kind` artifact with `records`, in the order given.
    ///
    /// Returns [`BuildlineError::EmptyHistory`] without touching the file if
    /// `records` is empty. The new content goes to a sibling temp file first
    /// and is renamed over the artifact.
    #[instrument(skip(self, records), fields(history = %kind, count = records.len()))]
    pub async fn persist(&self, kind: HistoryKind, records: &[BuildRecord]) -> Result<PathBuf> {
        if records.is_empty() {
            warn!("empty result, keeping existing artifact");
            return Err(BuildlineError::EmptyHistory { history: kind });
        }

        let entries: Vec<HistoryEntry> = records.iter().map(BuildRecord::to_entry).collect();
        let mut json = serde_json::to_string_pretty(&entries)
            .map_err(|e| BuildlineError::parse(format!("failed to serialize {kind} history: {e}")))?;
        json.push('\n');

        let path = self.path(kind);
        write_replacing(&path, json.as_bytes()).await?;

        info!(path = %path.display(), "history written");
        Ok(path)
    }

    /// Read the `kind` artifact back.
    pub async fn load(&self, kind: HistoryKind) -> Result<Vec<HistoryEntry>> {
        let path = self.path(kind);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| BuildlineError::io(&path, e))?;
        serde_json::from_str(&content)
            .map_err(|e| BuildlineError::parse(format!("{}: {e}", path.display())))
    }
}

async fn write_replacing(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| BuildlineError::io(parent, e))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| BuildlineError::io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| BuildlineError::io(path, e))
}
