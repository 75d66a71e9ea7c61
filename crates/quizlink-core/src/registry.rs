//! Device version and activity registry.
//!
//! Tracks, per device id, the last firmware version the device reported
//! and when it was last heard from. Every mutation writes through the
//! document store before returning, so a restart never resurrects stale
//! in-memory state. Writers are serialized by a per-collection mutex,
//! which removes the read-modify-write race the store itself cannot
//! prevent.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::Result;
use crate::store::{Collection, JsonStore};

/// Version assumed for a device that has never reported one.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// A device comes online the moment it first polls or checks for updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub current_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

/// Full device mapping, as persisted.
pub type DeviceMap = BTreeMap<String, DeviceRecord>;

/// Derived presence of a device, computed from `last_seen` age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Online,
    Recent,
    Offline,
    Unknown,
}

/// Presence of a device whose last activity was at `last_seen`.
///
/// Online under a minute, recently-active under five, offline beyond that.
pub fn presence(last_seen: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Presence {
    let Some(seen) = last_seen else {
        return Presence::Unknown;
    };
    let age = now.signed_duration_since(seen).num_seconds();
    if age < 60 {
        Presence::Online
    } else if age < 300 {
        Presence::Recent
    } else {
        Presence::Offline
    }
}

/// Write-through registry of device firmware versions and activity.
pub struct VersionRegistry {
    store: JsonStore,
    devices: Mutex<DeviceMap>,
}

impl VersionRegistry {
    /// Load the registry from the store, degrading to an empty mapping on
    /// a read failure.
    pub async fn load(store: JsonStore) -> Self {
        let devices = match store.load::<DeviceMap>(Collection::DeviceVersions).await {
            Ok(Some(map)) => map,
            Ok(None) => DeviceMap::new(),
            Err(e) => {
                warn!(error = %e, "Failed to load device registry, starting empty");
                DeviceMap::new()
            }
        };
        Self {
            store,
            devices: Mutex::new(devices),
        }
    }

    /// Unconditionally record the firmware version a device reported.
    ///
    /// Returns the full updated mapping.
    pub async fn record_version(&self, device_id: &str, version: &str) -> Result<DeviceMap> {
        let mut devices = self.devices.lock().await;
        devices
            .entry(device_id.to_string())
            .and_modify(|rec| rec.current_version = version.to_string())
            .or_insert_with(|| DeviceRecord {
                current_version: version.to_string(),
                last_seen: None,
            });

        self.store.save(Collection::DeviceVersions, &*devices).await?;
        debug!(device_id, version, "Device version recorded");
        Ok(devices.clone())
    }

    /// Record that a device made contact, refreshing its `last_seen`.
    ///
    /// A previously unseen device is initialized to [`DEFAULT_VERSION`].
    /// Returns the full updated mapping.
    pub async fn record_activity(&self, device_id: &str) -> Result<DeviceMap> {
        let mut devices = self.devices.lock().await;
        let record = devices
            .entry(device_id.to_string())
            .or_insert_with(|| DeviceRecord {
                current_version: DEFAULT_VERSION.to_string(),
                last_seen: None,
            });
        record.last_seen = Some(Utc::now());

        self.store.save(Collection::DeviceVersions, &*devices).await?;
        debug!(device_id, "Device activity recorded");
        Ok(devices.clone())
    }

    /// Snapshot of all known devices.
    pub async fn devices(&self) -> DeviceMap {
        self.devices.lock().await.clone()
    }
}
