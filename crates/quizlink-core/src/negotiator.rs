//! Firmware update negotiation.
//!
//! Given the version a device reports, decide whether a newer build
//! exists in the catalog and which one to offer. Checking is itself a
//! registration: the reported version is recorded before the catalog is
//! consulted, so the device roster stays current even when no update is
//! found.

use std::sync::Arc;

use tracing::debug;

use crate::catalog::{FirmwareCatalog, FirmwareDescriptor};
use crate::error::Result;
use crate::registry::VersionRegistry;
use crate::version::{cmp_versions, is_newer};

/// Outcome of an update check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateDecision {
    /// A strictly newer build exists; `version` is the highest candidate.
    UpdateAvailable {
        version: String,
        firmware: FirmwareDescriptor,
    },
    /// Nothing newer than what the device is running.
    UpToDate,
}

/// Decides update availability from the catalog and registry.
pub struct UpdateNegotiator {
    registry: Arc<VersionRegistry>,
    catalog: Arc<FirmwareCatalog>,
}

impl UpdateNegotiator {
    pub const fn new(registry: Arc<VersionRegistry>, catalog: Arc<FirmwareCatalog>) -> Self {
        Self { registry, catalog }
    }

    /// Record the device's reported version, then pick the highest catalog
    /// version strictly newer than it under dotted-numeric ordering.
    ///
    /// An empty catalog simply yields [`UpdateDecision::UpToDate`].
    pub async fn check_update(
        &self,
        device_id: &str,
        current_version: &str,
    ) -> Result<UpdateDecision> {
        self.registry
            .record_version(device_id, current_version)
            .await?;

        let versions = self.catalog.versions().await;
        let mut candidates: Vec<(String, FirmwareDescriptor)> = versions
            .into_iter()
            .filter(|(version, _)| is_newer(version, current_version))
            .collect();
        candidates.sort_by(|(a, _), (b, _)| cmp_versions(b, a));

        match candidates.into_iter().next() {
            Some((version, firmware)) => {
                debug!(device_id, current_version, latest = %version, "Update available");
                Ok(UpdateDecision::UpdateAvailable { version, firmware })
            }
            None => {
                debug!(device_id, current_version, "Device is up to date");
                Ok(UpdateDecision::UpToDate)
            }
        }
    }
}
