//! Test utilities for driving the link supervisor without a radio
//!
//! [`MockMesh`] owns a scripted [`MockTransport`] and the shared state the
//! tests inspect after the supervisor has run against it.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use plejd_ble::{
    transport_event_channel, GattService, LinkConfig, LinkError, LinkSupervisor, MeshEventReceiver,
    MeshHandle, MeshTransport, NodeId, NodeInfo, TransportError, TransportEvent,
    TransportEventSender, AUTH_CHARACTERISTIC_UUID, DATA_CHARACTERISTIC_UUID,
    LAST_DATA_CHARACTERISTIC_UUID, PING_CHARACTERISTIC_UUID, PLEJD_SERVICE_UUID,
};
use plejd_core::crypto::challenge_response;
use plejd_core::{Catalog, LinkAddress, LinkCipher, MeshEvent, MeshKey, SceneBook};
use tokio::task::JoinHandle;
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Fixtures
// ----------------------------------------------------------------------------

pub const NODE_A: &str = "/org/bluez/hci0/dev_AA_BB_CC_DD_EE_01";
pub const NODE_B: &str = "/org/bluez/hci0/dev_AA_BB_CC_DD_EE_02";
pub const CHALLENGE: [u8; 16] = [
    0x10, 0x32, 0x54, 0x76, 0x98, 0xba, 0xdc, 0xfe, 0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef,
];

/// A key the mock node does not share with the supervisor
pub fn foreign_key() -> MeshKey {
    MeshKey::new([0x5a; 16])
}

pub fn test_key() -> MeshKey {
    MeshKey::new([
        0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee,
        0xff,
    ])
}

/// Link config with keepalive off and default timings
pub fn quiet_config() -> LinkConfig {
    LinkConfig::default().with_keep_alive(false)
}

pub fn mesh_service() -> GattService {
    GattService {
        uuid: PLEJD_SERVICE_UUID,
        characteristics: vec![
            DATA_CHARACTERISTIC_UUID,
            LAST_DATA_CHARACTERISTIC_UUID,
            AUTH_CHARACTERISTIC_UUID,
            PING_CHARACTERISTIC_UUID,
        ],
    }
}

/// A node the mock radio reports during discovery
#[derive(Debug, Clone)]
pub struct MockNode {
    pub id: NodeId,
    pub address: String,
    pub rssi: Option<i16>,
    pub services: Vec<Uuid>,
    pub accepts_connect: bool,
}

impl MockNode {
    pub fn mesh(path: &str, address: &str, rssi: i16) -> Self {
        Self {
            id: NodeId::new(path),
            address: address.to_string(),
            rssi: Some(rssi),
            services: vec![PLEJD_SERVICE_UUID],
            accepts_connect: true,
        }
    }

    pub fn link_address(&self) -> LinkAddress {
        LinkAddress::from_platform_address(&self.address).expect("valid mock address")
    }
}

// ----------------------------------------------------------------------------
// Mock Transport
// ----------------------------------------------------------------------------

/// Everything the mock radio was asked to do, plus the knobs tests turn
#[derive(Debug)]
pub struct MockState {
    pub key: MeshKey,
    pub nodes: Vec<MockNode>,
    pub gatt: Vec<GattService>,
    pub scan_error: Option<TransportError>,
    /// Results for data characteristic writes, consumed front first
    pub write_script: VecDeque<Result<(), TransportError>>,
    /// Added to the ping byte to form the pong; 1 is a healthy node
    pub pong_offset: u8,
    /// When set, every ping read fails with this error
    pub ping_error: Option<TransportError>,

    pub connected: Option<NodeId>,
    pub connects: Vec<NodeId>,
    pub disconnects: usize,
    pub purges: usize,
    pub scans: usize,
    pub subscribe_calls: usize,
    pub active_subscriptions: usize,
    pub authenticated: bool,
    pub auth_writes: Vec<Vec<u8>>,
    pub data_writes: Vec<Vec<u8>>,
    pub last_ping: Option<u8>,
}

impl MockState {
    fn new(key: MeshKey) -> Self {
        Self {
            key,
            nodes: vec![MockNode::mesh(NODE_A, "AA:BB:CC:DD:EE:01", -60)],
            gatt: vec![mesh_service()],
            scan_error: None,
            write_script: VecDeque::new(),
            pong_offset: 1,
            ping_error: None,
            connected: None,
            connects: Vec::new(),
            disconnects: 0,
            purges: 0,
            scans: 0,
            subscribe_calls: 0,
            active_subscriptions: 0,
            authenticated: false,
            auth_writes: Vec::new(),
            data_writes: Vec::new(),
            last_ping: None,
        }
    }

    fn connected_node(&self) -> Option<&MockNode> {
        let id = self.connected.as_ref()?;
        self.nodes.iter().find(|n| &n.id == id)
    }
}

pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    events: TransportEventSender,
}

impl MockTransport {
    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state poisoned")
    }
}

#[async_trait]
impl MeshTransport for MockTransport {
    async fn purge_stale_nodes(&mut self, _service: Uuid) -> Result<usize, TransportError> {
        self.state().purges += 1;
        Ok(0)
    }

    async fn start_scan(&mut self, service: Uuid) -> Result<(), TransportError> {
        let mut state = self.state();
        if let Some(err) = state.scan_error.clone() {
            return Err(err);
        }
        state.scans += 1;
        for node in state.nodes.iter().filter(|n| n.services.contains(&service)) {
            let _ = self.events.send(TransportEvent::NodeDiscovered {
                node: node.id.clone(),
                services: node.services.clone(),
            });
        }
        Ok(())
    }

    async fn stop_scan(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn inspect(&mut self, node: &NodeId) -> Result<NodeInfo, TransportError> {
        let state = self.state();
        let node = state
            .nodes
            .iter()
            .find(|n| &n.id == node)
            .ok_or_else(|| TransportError::UnknownNode(node.to_string()))?;
        Ok(NodeInfo {
            rssi: node.rssi,
            address: Some(node.address.clone()),
        })
    }

    async fn connect(&mut self, node: &NodeId) -> Result<(), TransportError> {
        let mut state = self.state();
        let accepts = state
            .nodes
            .iter()
            .any(|n| &n.id == node && n.accepts_connect);
        if !accepts {
            return Err(TransportError::ConnectFailed("refused".to_string()));
        }
        state.connects.push(node.clone());
        state.connected = Some(node.clone());
        state.authenticated = false;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let mut state = self.state();
        state.connected = None;
        state.active_subscriptions = 0;
        state.disconnects += 1;
        Ok(())
    }

    async fn services(&mut self) -> Result<Vec<GattService>, TransportError> {
        let state = self.state();
        if state.connected.is_none() {
            return Err(TransportError::NotConnected);
        }
        Ok(state.gatt.clone())
    }

    async fn write(&mut self, characteristic: Uuid, data: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state();
        if state.connected.is_none() {
            return Err(TransportError::NotConnected);
        }

        if characteristic == AUTH_CHARACTERISTIC_UUID {
            state.auth_writes.push(data.to_vec());
            if data.len() == CHALLENGE.len() {
                let expected = challenge_response(&state.key, &CHALLENGE);
                if data != expected.as_slice() {
                    return Err(TransportError::Io("bad challenge response".to_string()));
                }
                state.authenticated = true;
            }
            Ok(())
        } else if characteristic == PING_CHARACTERISTIC_UUID {
            state.last_ping = data.first().copied();
            Ok(())
        } else if characteristic == DATA_CHARACTERISTIC_UUID {
            if !state.authenticated {
                return Err(TransportError::Io("not authenticated".to_string()));
            }
            let result = state.write_script.pop_front().unwrap_or(Ok(()));
            if result.is_ok() {
                state.data_writes.push(data.to_vec());
            }
            result
        } else {
            Err(TransportError::CharacteristicNotFound(characteristic))
        }
    }

    async fn read(&mut self, characteristic: Uuid) -> Result<Vec<u8>, TransportError> {
        let state = self.state();
        if characteristic == AUTH_CHARACTERISTIC_UUID {
            Ok(CHALLENGE.to_vec())
        } else if characteristic == PING_CHARACTERISTIC_UUID {
            if let Some(err) = state.ping_error.clone() {
                return Err(err);
            }
            let ping = state.last_ping.ok_or(TransportError::Io("no ping".to_string()))?;
            Ok(vec![ping.wrapping_add(state.pong_offset)])
        } else {
            Err(TransportError::CharacteristicNotFound(characteristic))
        }
    }

    async fn subscribe(&mut self, _characteristic: Uuid) -> Result<(), TransportError> {
        let mut state = self.state();
        state.subscribe_calls += 1;
        state.active_subscriptions += 1;
        Ok(())
    }

    async fn unsubscribe_all(&mut self) -> Result<(), TransportError> {
        self.state().active_subscriptions = 0;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Mock Mesh
// ----------------------------------------------------------------------------

/// A supervisor running against a [`MockTransport`]
pub struct MockMesh {
    pub state: Arc<Mutex<MockState>>,
    pub events: TransportEventSender,
    pub handle: MeshHandle,
    pub mesh_events: MeshEventReceiver,
    pub task: JoinHandle<Result<(), LinkError>>,
}

/// Builder for [`MockMesh`]
pub struct MockMeshBuilder {
    state: MockState,
    config: LinkConfig,
    catalog: Catalog,
    scenes: Option<Arc<dyn SceneBook>>,
}

impl MockMeshBuilder {
    pub fn new() -> Self {
        Self {
            state: MockState::new(test_key()),
            config: quiet_config(),
            catalog: Catalog::default(),
            scenes: None,
        }
    }

    pub fn config(mut self, config: LinkConfig) -> Self {
        self.config = config;
        self
    }

    pub fn nodes(mut self, nodes: Vec<MockNode>) -> Self {
        self.state.nodes = nodes;
        self
    }

    pub fn gatt(mut self, gatt: Vec<GattService>) -> Self {
        self.state.gatt = gatt;
        self
    }

    pub fn catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn scenes(mut self, scenes: Arc<dyn SceneBook>) -> Self {
        self.scenes = Some(scenes);
        self
    }

    pub fn with_state(mut self, f: impl FnOnce(&mut MockState)) -> Self {
        f(&mut self.state);
        self
    }

    pub fn spawn(self) -> MockMesh {
        let (events, event_receiver) = transport_event_channel();
        let state = Arc::new(Mutex::new(self.state));
        let transport = MockTransport {
            state: state.clone(),
            events: events.clone(),
        };

        let (mut supervisor, handle, mesh_events) = LinkSupervisor::new(
            transport,
            event_receiver,
            test_key(),
            Arc::new(self.catalog),
            self.config,
        );
        if let Some(scenes) = self.scenes {
            supervisor = supervisor.with_scene_book(scenes);
        }

        MockMesh {
            state,
            events,
            handle,
            mesh_events,
            task: tokio::spawn(supervisor.run()),
        }
    }
}

impl Default for MockMeshBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMesh {
    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state poisoned")
    }

    /// Wait for the next event matching `predicate`, skipping others
    pub async fn next_matching(&mut self, predicate: impl Fn(&MeshEvent) -> bool) -> MeshEvent {
        tokio::time::timeout(Duration::from_secs(120), async {
            loop {
                match self.mesh_events.recv().await {
                    Some(event) if predicate(&event) => return event,
                    Some(_) => continue,
                    None => panic!("mesh event channel closed"),
                }
            }
        })
        .await
        .expect("timed out waiting for mesh event")
    }

    /// Collect every event up to and including the next one matching `predicate`
    pub async fn collect_until(
        &mut self,
        predicate: impl Fn(&MeshEvent) -> bool,
    ) -> Vec<MeshEvent> {
        tokio::time::timeout(Duration::from_secs(120), async {
            let mut seen = Vec::new();
            loop {
                let event = self
                    .mesh_events
                    .recv()
                    .await
                    .expect("mesh event channel closed");
                let done = predicate(&event);
                seen.push(event);
                if done {
                    return seen;
                }
            }
        })
        .await
        .expect("timed out waiting for mesh event")
    }

    pub async fn connected(&mut self) -> MeshEvent {
        self.next_matching(|e| matches!(e, MeshEvent::Connected { .. }))
            .await
    }

    /// Encrypt `plaintext` for the connected node and deliver it as a notification
    pub fn notify(&self, plaintext: &[u8]) {
        let address = {
            let state = self.state();
            state
                .connected_node()
                .expect("a connected node")
                .link_address()
        };
        let cipher = LinkCipher::new(&test_key(), address);
        self.events
            .send(TransportEvent::Notification {
                characteristic: LAST_DATA_CHARACTERISTIC_UUID,
                value: cipher.apply(plaintext),
            })
            .expect("supervisor listening");
    }

    /// Data characteristic writes, decrypted for the node they were sent to
    pub fn written_frames(&self, node: &MockNode) -> Vec<Vec<u8>> {
        let cipher = LinkCipher::new(&test_key(), node.link_address());
        self.state()
            .data_writes
            .iter()
            .map(|w| cipher.apply(w))
            .collect()
    }

    /// Events emitted so far, without waiting
    pub fn drain_events(&mut self) -> Vec<MeshEvent> {
        let mut seen = Vec::new();
        while let Ok(event) = self.mesh_events.try_recv() {
            seen.push(event);
        }
        seen
    }

    /// Advance paused time until `count` data writes have landed
    pub async fn wait_for_writes(&self, count: usize) {
        for _ in 0..600 {
            if self.state().data_writes.len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!(
            "expected {} writes, saw {}",
            count,
            self.state().data_writes.len()
        );
    }
}

pub fn default_node() -> MockNode {
    MockNode::mesh(NODE_A, "AA:BB:CC:DD:EE:01", -60)
}
