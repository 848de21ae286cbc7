//! Linux stale node cleanup using bluer (BlueZ)

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::StaleNodePurger;
use crate::error::TransportError;

// ----------------------------------------------------------------------------
// Linux Implementation
// ----------------------------------------------------------------------------

/// Removes cached mesh nodes from BlueZ so the next scan sees them fresh
pub struct BluezPurger {
    session: Option<bluer::Session>,
    adapter: Option<bluer::Adapter>,
}

impl BluezPurger {
    pub fn new() -> Self {
        Self {
            session: None,
            adapter: None,
        }
    }

    async fn initialize(&mut self) -> Result<&bluer::Adapter, TransportError> {
        if self.session.is_none() {
            let session = bluer::Session::new().await.map_err(|e| {
                TransportError::AdapterNotAvailable(format!("BlueZ session: {}", e))
            })?;
            let adapter = session.default_adapter().await.map_err(|e| {
                TransportError::AdapterNotAvailable(format!("BlueZ adapter: {}", e))
            })?;
            debug!("BlueZ adapter {} ready for cleanup", adapter.name());
            self.session = Some(session);
            self.adapter = Some(adapter);
        }

        self.adapter
            .as_ref()
            .ok_or_else(|| TransportError::AdapterNotAvailable("BlueZ adapter".to_string()))
    }
}

impl Default for BluezPurger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl StaleNodePurger for BluezPurger {
    async fn purge(&mut self, service: Uuid) -> Result<usize, TransportError> {
        let adapter = self.initialize().await?;
        let addresses = adapter
            .device_addresses()
            .await
            .map_err(|e| TransportError::Io(format!("Failed to list devices: {}", e)))?;

        let mut purged = 0;
        for address in addresses {
            let device = match adapter.device(address) {
                Ok(device) => device,
                Err(e) => {
                    debug!("Skipping {}: {}", address, e);
                    continue;
                }
            };

            let advertises_mesh = device
                .uuids()
                .await
                .ok()
                .flatten()
                .is_some_and(|uuids| uuids.contains(&service));
            if !advertises_mesh {
                continue;
            }

            if device.is_connected().await.unwrap_or(false) {
                info!("Disconnecting stale mesh node {}", address);
                if let Err(e) = device.disconnect().await {
                    warn!("Failed to disconnect {}: {}", address, e);
                }
            }

            match adapter.remove_device(address).await {
                Ok(()) => {
                    debug!("Removed cached mesh node {}", address);
                    purged += 1;
                }
                Err(e) => warn!("Failed to remove {}: {}", address, e),
            }
        }

        Ok(purged)
    }
}
