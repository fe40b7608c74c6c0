//! Pass completion markers.
//!
//! `<state>/metadata.json` always holds the latest marker; every pass also
//! leaves an immutable copy at `<state>/snapshots/<name>/metadata.json`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use paintdry_model::SnapshotMarker;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;

#[derive(Debug, Serialize, Deserialize)]
struct MetadataFile {
    last_update: SnapshotMarker,
}

#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    state_dir: PathBuf,
}

impl SnapshotWriter {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.state_dir.join("metadata.json")
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.state_dir.join("snapshots")
    }

    /// Last committed marker. A missing or unreadable file means no pass has
    /// completed yet.
    pub async fn latest(&self) -> Option<SnapshotMarker> {
        read_marker(&self.metadata_path()).await
    }

    /// Write the next marker, numbered one past the latest.
    pub async fn commit(&self, at: DateTime<Utc>) -> Result<SnapshotMarker> {
        let seq = self.latest().await.map_or(0, |marker| marker.seq) + 1;
        let time = at.format("%Y-%m-%dT%H:%M:%S").to_string();
        let marker = SnapshotMarker {
            seq,
            name: format!("{seq:05}-{time}"),
            time,
        };

        let snapshot_dir = self.snapshots_dir().join(&marker.name);
        tokio::fs::create_dir_all(&snapshot_dir).await?;

        let mut contents = serde_json::to_string_pretty(&MetadataFile {
            last_update: marker.clone(),
        })?;
        contents.push('\n');

        write_atomic(&snapshot_dir.join("metadata.json"), &contents).await?;
        write_atomic(&self.metadata_path(), &contents).await?;

        info!(seq = marker.seq, name = %marker.name, "snapshot committed");
        Ok(marker)
    }
}

async fn read_marker(path: &Path) -> Option<SnapshotMarker> {
    let raw = tokio::fs::read_to_string(path).await.ok()?;
    match serde_json::from_str::<MetadataFile>(&raw) {
        Ok(file) => Some(file.last_update),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring unreadable snapshot metadata");
            None
        }
    }
}

async fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn sequence_increases_and_each_pass_gets_a_folder() {
        let state = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(state.path());
        assert!(writer.latest().await.is_none());

        let at = Utc.with_ymd_and_hms(2024, 10, 29, 22, 42, 27).unwrap();
        let first = writer.commit(at).await.unwrap();
        let second = writer.commit(at).await.unwrap();

        assert_eq!(first.seq, 1);
        assert_eq!(first.name, "00001-2024-10-29T22:42:27");
        assert_eq!(second.seq, 2);
        assert_eq!(writer.latest().await.unwrap(), second);

        let archived = std::fs::read_to_string(
            writer.snapshots_dir().join(&first.name).join("metadata.json"),
        )
        .unwrap();
        let archived: serde_json::Value = serde_json::from_str(&archived).unwrap();
        assert_eq!(archived["last_update"]["seq"], 1);
    }

    #[tokio::test]
    async fn corrupt_metadata_restarts_sequence() {
        let state = tempfile::tempdir().unwrap();
        std::fs::write(state.path().join("metadata.json"), "{").unwrap();
        let writer = SnapshotWriter::new(state.path());
        let marker = writer.commit(Utc::now()).await.unwrap();
        assert_eq!(marker.seq, 1);
    }
}
