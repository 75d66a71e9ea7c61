//! JSON document store for Quizlink collections.
//!
//! Each logical collection is persisted as one JSON file under the data
//! directory. The store itself never decides what a missing collection
//! means: `load` distinguishes "never written" (`Ok(None)`) from a real
//! read failure (`Err`), and the owning component picks the default.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;

/// Logical collections persisted by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Answers,
    Questions,
    DeviceVersions,
    Firmware,
}

impl Collection {
    /// File name backing this collection inside the data directory.
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Answers => "answers.json",
            Self::Questions => "questions.json",
            Self::DeviceVersions => "device-versions.json",
            Self::Firmware => "firmware-config.json",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Errors raised by the document store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {collection}: {message}")]
    Io {
        collection: &'static str,
        message: String,
    },

    #[error("Failed to serialize {collection}: {message}")]
    Serialize {
        collection: &'static str,
        message: String,
    },

    #[error("Failed to deserialize {collection}: {message}")]
    Deserialize {
        collection: &'static str,
        message: String,
    },
}

/// File-backed JSON store, one document per [`Collection`].
#[derive(Debug, Clone)]
pub struct JsonStore {
    data_dir: PathBuf,
}

impl JsonStore {
    /// Open the store rooted at `data_dir`, creating the directory if absent.
    pub async fn open(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .map_err(|e| StoreError::Io {
                collection: "data directory",
                message: e.to_string(),
            })?;

        info!(path = %data_dir.display(), "Document store opened");
        Ok(Self { data_dir })
    }

    /// Load the persisted value for `collection`.
    ///
    /// Returns `Ok(None)` when the collection has never been written.
    /// A read or parse failure is an error; callers degrade to their
    /// collection default as they see fit.
    pub async fn load<T: DeserializeOwned>(
        &self,
        collection: Collection,
    ) -> Result<Option<T>, StoreError> {
        let path = self.path_for(collection);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::Io {
                    collection: collection.file_name(),
                    message: e.to_string(),
                });
            }
        };

        let value = serde_json::from_str(&raw).map_err(|e| StoreError::Deserialize {
            collection: collection.file_name(),
            message: e.to_string(),
        })?;
        Ok(Some(value))
    }

    /// Durably overwrite the stored value for `collection`.
    ///
    /// Writes to a temporary sibling file first and renames over the
    /// target, so a crash mid-write never leaves a truncated document.
    pub async fn save<T: Serialize>(
        &self,
        collection: Collection,
        value: &T,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(value).map_err(|e| StoreError::Serialize {
            collection: collection.file_name(),
            message: e.to_string(),
        })?;

        let path = self.path_for(collection);
        let tmp = path.with_extension("json.tmp");
        let io_err = |e: std::io::Error| StoreError::Io {
            collection: collection.file_name(),
            message: e.to_string(),
        };

        tokio::fs::write(&tmp, json.as_bytes())
            .await
            .map_err(io_err)?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_err)?;
        Ok(())
    }

    fn path_for(&self, collection: Collection) -> PathBuf {
        self.data_dir.join(collection.file_name())
    }

    /// Root directory backing this store.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    async fn temp_store() -> (tempfile::TempDir, JsonStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn missing_collection_loads_as_none() {
        let (_dir, store) = temp_store().await;
        let loaded: Option<Vec<String>> = store.load(Collection::Answers).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let (_dir, store) = temp_store().await;
        let mut map = BTreeMap::new();
        map.insert("dev-1".to_string(), "1.2.0".to_string());

        store.save(Collection::DeviceVersions, &map).await.unwrap();
        let loaded: Option<BTreeMap<String, String>> =
            store.load(Collection::DeviceVersions).await.unwrap();
        assert_eq!(loaded, Some(map));
    }

    #[tokio::test]
    async fn save_overwrites_previous_value() {
        let (_dir, store) = temp_store().await;
        store
            .save(Collection::Answers, &vec!["a".to_string()])
            .await
            .unwrap();
        store
            .save(Collection::Answers, &vec!["b".to_string(), "c".to_string()])
            .await
            .unwrap();

        let loaded: Option<Vec<String>> = store.load(Collection::Answers).await.unwrap();
        assert_eq!(loaded, Some(vec!["b".to_string(), "c".to_string()]));
    }

    #[tokio::test]
    async fn corrupt_file_is_a_deserialize_error() {
        let (dir, store) = temp_store().await;
        tokio::fs::write(dir.path().join("answers.json"), b"{not json")
            .await
            .unwrap();

        let result: Result<Option<Vec<String>>, StoreError> =
            store.load(Collection::Answers).await;
        assert!(matches!(result, Err(StoreError::Deserialize { .. })));
    }

    #[tokio::test]
    async fn open_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("state").join("quizlink");
        let store = JsonStore::open(&nested).await.unwrap();
        assert_eq!(store.data_dir(), nested.as_path());
        assert!(nested.is_dir());
    }
}
