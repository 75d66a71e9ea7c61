//! Firmware catalog.
//!
//! Maps a version string to the metadata a device needs to fetch that
//! build. Registration overwrites in place (last write wins, no merge);
//! removal of an unknown version is a no-op. Every mutation writes
//! through the document store.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::Result;
use crate::store::{Collection, JsonStore};

/// Metadata advertised for one firmware build.
///
/// The catalog only advertises; it never validates the binary, the
/// checksum format, or the URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareDescriptor {
    pub url: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub checksum: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub release_date: String,
}

/// Full catalog, as persisted: version string -> descriptor.
pub type FirmwareMap = BTreeMap<String, FirmwareDescriptor>;

/// Catalog seeded for a fresh deployment so the first device check has a
/// baseline entry to compare against.
fn seed_catalog() -> FirmwareMap {
    let mut map = FirmwareMap::new();
    map.insert(
        "1.0.0".to_string(),
        FirmwareDescriptor {
            url: "https://github.com/sakost/quizlink/releases/download/v1.0.0/quizlink_v1.0.0.bin"
                .to_string(),
            size: 1_024_000,
            checksum: "sha256:abc123...".to_string(),
            description: "Initial release with relay support".to_string(),
            release_date: "2025-08-26".to_string(),
        },
    );
    map
}

/// Write-through registry of known firmware versions.
pub struct FirmwareCatalog {
    store: JsonStore,
    versions: Mutex<FirmwareMap>,
}

impl FirmwareCatalog {
    /// Load the catalog from the store, degrading to the seed catalog on
    /// a read failure or an untouched deployment.
    pub async fn load(store: JsonStore) -> Self {
        let versions = match store.load::<FirmwareMap>(Collection::Firmware).await {
            Ok(Some(map)) => map,
            Ok(None) => seed_catalog(),
            Err(e) => {
                warn!(error = %e, "Failed to load firmware catalog, using seed catalog");
                seed_catalog()
            }
        };
        Self {
            store,
            versions: Mutex::new(versions),
        }
    }

    /// Insert or overwrite the descriptor for `version`.
    ///
    /// A missing `release_date` is stamped with today's date. Returns the
    /// full updated catalog.
    pub async fn register(
        &self,
        version: &str,
        mut descriptor: FirmwareDescriptor,
    ) -> Result<FirmwareMap> {
        if descriptor.release_date.is_empty() {
            descriptor.release_date = Utc::now().format("%Y-%m-%d").to_string();
        }

        let mut versions = self.versions.lock().await;
        versions.insert(version.to_string(), descriptor);
        self.store.save(Collection::Firmware, &*versions).await?;

        info!(version, "Firmware version registered");
        Ok(versions.clone())
    }

    /// Remove `version` if present; removing an unknown version is a
    /// no-op, not an error. Returns the full catalog either way.
    pub async fn unregister(&self, version: &str) -> Result<FirmwareMap> {
        let mut versions = self.versions.lock().await;
        if versions.remove(version).is_some() {
            self.store.save(Collection::Firmware, &*versions).await?;
            info!(version, "Firmware version deleted");
        }
        Ok(versions.clone())
    }

    /// Snapshot of all registered versions.
    pub async fn versions(&self) -> FirmwareMap {
        self.versions.lock().await.clone()
    }

    /// Descriptor for a single version, if registered.
    pub async fn get(&self, version: &str) -> Option<FirmwareDescriptor> {
        self.versions.lock().await.get(version).cloned()
    }
}
