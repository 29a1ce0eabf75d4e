// JSON file store for the recency log: a flat list of the last accepted
// texts, rewritten whole (temp file + rename) after every accepted post.

use crate::core::dedup::{DedupError, RecencyStore};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

pub struct JsonRecencyStore {
    path: PathBuf,
}

impl JsonRecencyStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl RecencyStore for JsonRecencyStore {
    async fn load(&self) -> Result<Vec<String>, DedupError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&self.path)
            .await
            .map_err(|e| DedupError::Store(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| DedupError::Store(e.to_string()))
    }

    async fn save(&self, entries: &[String]) -> Result<(), DedupError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DedupError::Store(e.to_string()))?;
        }
        let text =
            serde_json::to_string(entries).map_err(|e| DedupError::Store(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, text)
            .await
            .map_err(|e| DedupError::Store(e.to_string()))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| DedupError::Store(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_an_empty_log() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonRecencyStore::new(dir.path().join("last_messages.json"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_then_load_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_messages.json");
        let store = JsonRecencyStore::new(&path);

        let entries = vec!["ראשון".to_string(), "שני".to_string()];
        store.save(&entries).await.unwrap();

        assert_eq!(JsonRecencyStore::new(&path).load().await.unwrap(), entries);
        assert!(!path.with_extension("json.tmp").exists());
    }
}
