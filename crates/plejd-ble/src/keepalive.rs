//! Keepalive monitor
//!
//! The node echoes a ping byte back incremented by one. Anything else means
//! the link is no longer trustworthy.

use std::time::Duration;

use tracing::info;
use uuid::Uuid;

use crate::gatt::MeshTransport;

/// Result of one ping round trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PingOutcome {
    Success(u8),
    Failed(String),
}

/// Periodic ping/pong liveness check
#[derive(Debug, Clone)]
pub struct KeepaliveMonitor {
    interval: Duration,
    verbose: bool,
}

impl KeepaliveMonitor {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            verbose: false,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// The pong a node must answer `ping` with
    pub fn expected_pong(ping: u8) -> u8 {
        ping.wrapping_add(1)
    }

    /// Ping with a random byte
    pub async fn ping<T: MeshTransport + ?Sized>(
        &self,
        transport: &mut T,
        characteristic: Uuid,
    ) -> PingOutcome {
        let value: u8 = rand::random();
        self.ping_with(transport, characteristic, value).await
    }

    pub async fn ping_with<T: MeshTransport + ?Sized>(
        &self,
        transport: &mut T,
        characteristic: Uuid,
        ping: u8,
    ) -> PingOutcome {
        if let Err(e) = transport.write(characteristic, &[ping]).await {
            return PingOutcome::Failed(format!("ping write failed: {}", e));
        }

        let pong = match transport.read(characteristic).await {
            Ok(pong) => pong,
            Err(e) => return PingOutcome::Failed(format!("pong read failed: {}", e)),
        };

        match pong.first() {
            Some(&pong) if pong == Self::expected_pong(ping) => {
                if self.verbose {
                    info!("Ping {} answered with {}", ping, pong);
                }
                PingOutcome::Success(pong)
            }
            Some(&pong) => PingOutcome::Failed(format!("ping {} answered with {}", ping, pong)),
            None => PingOutcome::Failed(format!("ping {} answered with an empty pong", ping)),
        }
    }
}
