//! Portable stale node cleanup through the btleplug adapter
//!
//! btleplug cannot evict cached devices, so this only disconnects mesh nodes
//! still connected from an earlier session.

use btleplug::api::{Central, Peripheral as _};
use btleplug::platform::Adapter;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::StaleNodePurger;
use crate::error::TransportError;

pub struct AdapterPurger {
    adapter: Adapter,
}

impl AdapterPurger {
    pub fn new(adapter: Adapter) -> Self {
        Self { adapter }
    }
}

#[async_trait::async_trait]
impl StaleNodePurger for AdapterPurger {
    async fn purge(&mut self, service: Uuid) -> Result<usize, TransportError> {
        let peripherals = self
            .adapter
            .peripherals()
            .await
            .map_err(|e| TransportError::Io(format!("Failed to list peripherals: {}", e)))?;

        let mut purged = 0;
        for peripheral in peripherals {
            let advertises_mesh = peripheral
                .properties()
                .await
                .ok()
                .flatten()
                .is_some_and(|props| props.services.contains(&service));
            if !advertises_mesh || !peripheral.is_connected().await.unwrap_or(false) {
                continue;
            }

            info!("Disconnecting stale mesh node {:?}", peripheral.id());
            match peripheral.disconnect().await {
                Ok(()) => purged += 1,
                Err(e) => warn!("Failed to disconnect {:?}: {}", peripheral.id(), e),
            }
        }

        debug!("Adapter cleanup disconnected {} node(s)", purged);
        Ok(purged)
    }
}
