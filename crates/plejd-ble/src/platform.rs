//! btleplug-backed mesh transport

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::stream::StreamExt;
use plejd_core::{Catalog, MeshKey};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::config::LinkConfig;
use crate::error::{LinkError, TransportError};
use crate::gatt::{
    transport_event_channel, GattService, MeshTransport, NodeId, NodeInfo, TransportEvent,
    TransportEventSender,
};
use crate::handle::{MeshEventReceiver, MeshHandle};
use crate::purge::{PlatformPurger, StaleNodePurger};
use crate::supervisor::LinkSupervisor;

type NodeTable = Arc<RwLock<HashMap<NodeId, PeripheralId>>>;

/// Open the first Bluetooth adapter and build a supervisor on top of it
pub async fn platform_link(
    key: MeshKey,
    catalog: Arc<Catalog>,
    config: LinkConfig,
) -> Result<(LinkSupervisor<BtleplugTransport>, MeshHandle, MeshEventReceiver), LinkError> {
    let (events, event_receiver) = transport_event_channel();
    let transport = BtleplugTransport::new(&config, events)
        .await
        .map_err(LinkError::Discovery)?;
    Ok(LinkSupervisor::new(
        transport,
        event_receiver,
        key,
        catalog,
        config,
    ))
}

// ----------------------------------------------------------------------------
// Transport
// ----------------------------------------------------------------------------

/// [`MeshTransport`] over the host's first Bluetooth adapter
pub struct BtleplugTransport {
    adapter: Adapter,
    purger: PlatformPurger,
    events: TransportEventSender,
    nodes: NodeTable,
    connected: Option<(NodeId, Peripheral)>,
    connection_timeout: Duration,
    central_task: Option<JoinHandle<()>>,
    notification_task: Option<JoinHandle<()>>,
}

impl BtleplugTransport {
    pub async fn new(
        config: &LinkConfig,
        events: TransportEventSender,
    ) -> Result<Self, TransportError> {
        let manager = Manager::new().await.map_err(|e| {
            TransportError::AdapterNotAvailable(format!("Failed to create BLE manager: {}", e))
        })?;
        let adapter = manager
            .adapters()
            .await
            .map_err(|e| {
                TransportError::AdapterNotAvailable(format!("Failed to get BLE adapters: {}", e))
            })?
            .into_iter()
            .next()
            .ok_or_else(|| {
                TransportError::AdapterNotAvailable("No BLE adapters available".to_string())
            })?;

        info!("BLE adapter initialized");
        Ok(Self {
            purger: PlatformPurger::new(adapter.clone()),
            adapter,
            events,
            nodes: Arc::new(RwLock::new(HashMap::new())),
            connected: None,
            connection_timeout: config.connection_timeout(),
            central_task: None,
            notification_task: None,
        })
    }

    async fn peripheral(&self, node: &NodeId) -> Result<Peripheral, TransportError> {
        let id = self
            .nodes
            .read()
            .await
            .get(node)
            .cloned()
            .ok_or_else(|| TransportError::UnknownNode(node.to_string()))?;
        self.adapter
            .peripheral(&id)
            .await
            .map_err(|_| TransportError::UnknownNode(node.to_string()))
    }

    fn connected(&self) -> Result<&Peripheral, TransportError> {
        self.connected
            .as_ref()
            .map(|(_, peripheral)| peripheral)
            .ok_or(TransportError::NotConnected)
    }

    fn characteristic(
        &self,
        uuid: Uuid,
    ) -> Result<(&Peripheral, Characteristic), TransportError> {
        let peripheral = self.connected()?;
        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or(TransportError::CharacteristicNotFound(uuid))?;
        Ok((peripheral, characteristic))
    }

    /// Forward adapter events as [`TransportEvent`]s
    async fn spawn_central_events(&mut self) -> Result<(), TransportError> {
        if let Some(task) = self.central_task.take() {
            task.abort();
        }

        let mut central_events = self
            .adapter
            .events()
            .await
            .map_err(|e| TransportError::ScanRejected(format!("No adapter events: {}", e)))?;
        let adapter = self.adapter.clone();
        let nodes = self.nodes.clone();
        let events = self.events.clone();

        self.central_task = Some(tokio::spawn(async move {
            while let Some(event) = central_events.next().await {
                let forwarded = match event {
                    CentralEvent::DeviceDiscovered(id) => {
                        let services = match adapter.peripheral(&id).await {
                            Ok(peripheral) => peripheral
                                .properties()
                                .await
                                .ok()
                                .flatten()
                                .map(|props| props.services)
                                .unwrap_or_default(),
                            Err(_) => Vec::new(),
                        };
                        let node = register(&nodes, id).await;
                        TransportEvent::NodeDiscovered { node, services }
                    }
                    CentralEvent::ServicesAdvertisement { id, services } => {
                        let node = register(&nodes, id).await;
                        TransportEvent::NodeDiscovered { node, services }
                    }
                    CentralEvent::DeviceDisconnected(id) => TransportEvent::Disconnected {
                        node: node_id(&id),
                    },
                    other => {
                        trace!("Ignoring central event {:?}", other);
                        continue;
                    }
                };

                if events.send(forwarded).is_err() {
                    break;
                }
            }
            debug!("Central event forwarder ended");
        }));
        Ok(())
    }
}

impl Drop for BtleplugTransport {
    fn drop(&mut self) {
        if let Some(task) = self.central_task.take() {
            task.abort();
        }
        if let Some(task) = self.notification_task.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl MeshTransport for BtleplugTransport {
    async fn purge_stale_nodes(&mut self, service: Uuid) -> Result<usize, TransportError> {
        self.purger.purge(service).await
    }

    async fn start_scan(&mut self, service: Uuid) -> Result<(), TransportError> {
        self.spawn_central_events().await?;
        self.adapter
            .start_scan(ScanFilter {
                services: vec![service],
            })
            .await
            .map_err(|e| TransportError::ScanRejected(e.to_string()))?;
        debug!("BLE scan started for {}", service);
        Ok(())
    }

    async fn stop_scan(&mut self) -> Result<(), TransportError> {
        self.adapter.stop_scan().await.map_err(classify)
    }

    async fn inspect(&mut self, node: &NodeId) -> Result<NodeInfo, TransportError> {
        let peripheral = self.peripheral(node).await?;
        let props = peripheral
            .properties()
            .await
            .map_err(classify)?
            .ok_or_else(|| TransportError::UnknownNode(node.to_string()))?;
        Ok(NodeInfo {
            rssi: props.rssi,
            address: Some(props.address.to_string()),
        })
    }

    async fn connect(&mut self, node: &NodeId) -> Result<(), TransportError> {
        let peripheral = self.peripheral(node).await?;
        match timeout(self.connection_timeout, peripheral.connect()).await {
            Ok(Ok(())) => {
                self.connected = Some((node.clone(), peripheral));
                Ok(())
            }
            Ok(Err(e)) => Err(TransportError::ConnectFailed(e.to_string())),
            Err(_) => Err(TransportError::Timeout),
        }
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        if let Some(task) = self.notification_task.take() {
            task.abort();
        }
        match self.connected.take() {
            Some((node, peripheral)) => {
                debug!("Disconnecting from {}", node);
                peripheral.disconnect().await.map_err(classify)
            }
            None => Ok(()),
        }
    }

    async fn services(&mut self) -> Result<Vec<GattService>, TransportError> {
        let peripheral = self.connected()?;
        peripheral
            .discover_services()
            .await
            .map_err(|e| TransportError::ServiceDiscovery(e.to_string()))?;

        Ok(peripheral
            .services()
            .into_iter()
            .map(|service| GattService {
                uuid: service.uuid,
                characteristics: service.characteristics.iter().map(|c| c.uuid).collect(),
            })
            .collect())
    }

    async fn write(&mut self, characteristic: Uuid, data: &[u8]) -> Result<(), TransportError> {
        let (peripheral, characteristic) = self.characteristic(characteristic)?;
        peripheral
            .write(&characteristic, data, WriteType::WithResponse)
            .await
            .map_err(classify)
    }

    async fn read(&mut self, characteristic: Uuid) -> Result<Vec<u8>, TransportError> {
        let (peripheral, characteristic) = self.characteristic(characteristic)?;
        peripheral.read(&characteristic).await.map_err(classify)
    }

    async fn subscribe(&mut self, characteristic: Uuid) -> Result<(), TransportError> {
        let (peripheral, target) = self.characteristic(characteristic)?;
        peripheral.subscribe(&target).await.map_err(classify)?;
        let mut notifications = peripheral.notifications().await.map_err(classify)?;

        if let Some(task) = self.notification_task.take() {
            task.abort();
        }
        let events = self.events.clone();
        self.notification_task = Some(tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                let event = TransportEvent::Notification {
                    characteristic: notification.uuid,
                    value: notification.value,
                };
                if events.send(event).is_err() {
                    break;
                }
            }
            debug!("Notification forwarder ended");
        }));
        Ok(())
    }

    async fn unsubscribe_all(&mut self) -> Result<(), TransportError> {
        if let Some(task) = self.notification_task.take() {
            task.abort();
        }
        let peripheral = self.connected()?;
        for characteristic in peripheral.characteristics() {
            if let Err(e) = peripheral.unsubscribe(&characteristic).await {
                trace!("Unsubscribe from {} failed: {}", characteristic.uuid, e);
            }
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

fn node_id(id: &PeripheralId) -> NodeId {
    NodeId::new(format!("{:?}", id))
}

async fn register(nodes: &NodeTable, id: PeripheralId) -> NodeId {
    let node = node_id(&id);
    nodes.write().await.insert(node.clone(), id);
    node
}

/// Map a btleplug error onto the transport taxonomy. BlueZ reports a busy
/// characteristic as "In Progress", which is safe to retry.
fn classify(err: btleplug::Error) -> TransportError {
    match err {
        btleplug::Error::NotConnected => TransportError::NotConnected,
        btleplug::Error::TimedOut(_) => TransportError::Timeout,
        other => {
            let message = other.to_string();
            if message.contains("In Progress") || message.contains("InProgress") {
                TransportError::InProgress
            } else {
                warn!("BLE operation failed: {}", message);
                TransportError::Io(message)
            }
        }
    }
}
