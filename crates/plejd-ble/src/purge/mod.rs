//! Stale node cleanup
//!
//! A node left connected or cached by a previous session can refuse new
//! connections. Before each discovery pass the supervisor asks the transport
//! to drop them. Only nodes advertising the mesh service are touched; other
//! paired devices on the host are left alone.

use btleplug::platform::Adapter;
use uuid::Uuid;

use crate::error::TransportError;

mod fallback;
#[cfg(target_os = "linux")]
mod linux;

pub use fallback::AdapterPurger;
#[cfg(target_os = "linux")]
pub use linux::BluezPurger;

// ----------------------------------------------------------------------------
// Purger Trait
// ----------------------------------------------------------------------------

#[async_trait::async_trait]
pub trait StaleNodePurger: Send + Sync {
    /// Remove stale nodes advertising `service`, returning how many were removed
    async fn purge(&mut self, service: Uuid) -> Result<usize, TransportError>;
}

// ----------------------------------------------------------------------------
// Platform Purger
// ----------------------------------------------------------------------------

/// Uses the native stack where one is available, otherwise disconnects
/// through the btleplug adapter
pub struct PlatformPurger {
    #[cfg(target_os = "linux")]
    bluez: BluezPurger,
    fallback: AdapterPurger,
}

impl PlatformPurger {
    pub fn new(adapter: Adapter) -> Self {
        Self {
            #[cfg(target_os = "linux")]
            bluez: BluezPurger::new(),
            fallback: AdapterPurger::new(adapter),
        }
    }
}

#[async_trait::async_trait]
impl StaleNodePurger for PlatformPurger {
    async fn purge(&mut self, service: Uuid) -> Result<usize, TransportError> {
        #[cfg(target_os = "linux")]
        {
            match self.bluez.purge(service).await {
                Ok(purged) => return Ok(purged),
                Err(e) => tracing::warn!("BlueZ cleanup unavailable ({}), falling back to adapter", e),
            }
        }

        self.fallback.purge(service).await
    }
}
