use crate::error::Result;
use crate::storage::{SeenSet, SeenStore};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Seen set persisted as a single pretty-printed JSON file.
pub struct JsonSeenStore {
    path: PathBuf,
}

impl JsonSeenStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("seen.json"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Write to a sibling temp file, then rename over the target so readers
    /// only ever see a complete document.
    async fn save_to_file(&self, json: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let temp_path = self.temp_path();
        let result = match write_synced(&temp_path, json).await {
            Ok(()) => fs::rename(&temp_path, &self.path).await,
            Err(e) => Err(e),
        };
        if result.is_err() {
            // 失败时不留下半成品临时文件
            let _ = fs::remove_file(&temp_path).await;
        }
        Ok(result?)
    }
}

async fn write_synced(path: &Path, json: &str) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(json.as_bytes()).await?;
    file.flush().await?;
    file.sync_all().await
}

#[async_trait]
impl SeenStore for JsonSeenStore {
    async fn load(&self) -> SeenSet {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No seen state at {}, starting fresh", self.path.display());
                return SeenSet::new();
            }
            Err(e) => {
                warn!("Failed to read {}: {}, starting fresh", self.path.display(), e);
                return SeenSet::new();
            }
        };

        match serde_json::from_str::<SeenSet>(&content) {
            Ok(seen) => seen,
            Err(e) => {
                warn!("Corrupt seen state in {}: {}, starting fresh", self.path.display(), e);
                SeenSet::new()
            }
        }
    }

    async fn save(&self, seen: &SeenSet) -> Result<()> {
        let json = serde_json::to_string_pretty(seen)?;
        self.save_to_file(&json).await?;
        info!(
            "Saved {} listings for {} terms to {}",
            seen.total_ids(),
            seen.term_count(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ListingId;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonSeenStore::new(dir.path().join("seen.json"));
        assert_eq!(store.load().await, SeenSet::new());
    }

    #[tokio::test]
    async fn test_corrupt_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seen.json");
        fs::write(&path, "{\"fiets\": [\"1\", ").await.unwrap();

        let store = JsonSeenStore::new(&path);
        assert_eq!(store.load().await, SeenSet::new());
    }

    #[tokio::test]
    async fn test_wrong_shape_loads_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seen.json");
        fs::write(&path, "[1, 2, 3]").await.unwrap();

        let store = JsonSeenStore::new(&path);
        assert_eq!(store.load().await, SeenSet::new());
    }

    #[tokio::test]
    async fn test_round_trip_preserves_order() {
        let dir = TempDir::new().unwrap();
        let store = JsonSeenStore::new(dir.path().join("seen.json"));

        let mut seen = SeenSet::new();
        for id in ["3", "1", "2"] {
            seen.mark("racefiets", id.into());
        }
        seen.mark("lamp", ListingId::Number(11));
        seen.ensure_term("bank");

        store.save(&seen).await.unwrap();
        let loaded = store.load().await;

        assert_eq!(loaded, seen);
        assert_eq!(
            loaded.ids("racefiets"),
            Some(&[ListingId::from("3"), ListingId::from("1"), ListingId::from("2")][..])
        );
    }

    #[tokio::test]
    async fn test_save_is_pretty_printed_and_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let store = JsonSeenStore::new(dir.path().join("seen.json"));

        let mut seen = SeenSet::new();
        seen.mark("fiets", "1".into());
        store.save(&seen).await.unwrap();

        let content = fs::read_to_string(store.path()).await.unwrap();
        assert!(content.contains('\n'));
        assert!(!dir.path().join("seen.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_save_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let store = JsonSeenStore::new(dir.path().join("state").join("seen.json"));

        store.save(&SeenSet::new()).await.unwrap();
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn test_save_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        // The target path is an existing directory, so the rename cannot succeed.
        let target = dir.path().join("seen.json");
        fs::create_dir_all(target.join("occupied")).await.unwrap();

        let store = JsonSeenStore::new(&target);
        assert!(store.save(&SeenSet::new()).await.is_err());
        assert!(!dir.path().join("seen.json.tmp").exists());
        assert!(target.join("occupied").exists());
    }
}
