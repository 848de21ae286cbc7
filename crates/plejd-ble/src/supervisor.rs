//! Link Supervisor
//!
//! Owns the one link to the mesh and walks it through its lifecycle:
//! - Discovering: purge stale nodes, scan for the mesh service
//! - Selecting: inspect candidates and rank them by signal strength
//! - Connecting: try candidates in order until one accepts
//! - Authenticating: bind characteristics and answer the node's challenge
//! - Active: drain the write queue, run the keepalive, decode notifications
//! - Reconnecting: tear everything down and start over
//!
//! All state is owned by a single task. Upstream talks to it through a
//! [`MeshHandle`] and listens on the [`MeshEvent`] channel.

use std::sync::Arc;

use async_trait::async_trait;
use plejd_core::{
    codec, crypto, Catalog, CatalogDevice, LinkAddress, LinkCipher, MeshCommand, MeshEvent,
    MeshKey, MeshSettings, OutboundFrame, SceneBook,
};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, sleep_until, Duration, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::config::LinkConfig;
use crate::discovery::{rank, Candidate, CandidateSet};
use crate::error::{LinkError, TransportError};
use crate::gatt::{CharacteristicSet, MeshTransport, NodeId, TransportEvent, TransportEventReceiver};
use crate::handle::{MeshEventReceiver, MeshHandle};
use crate::keepalive::{KeepaliveMonitor, PingOutcome};
use crate::protocol::{AUTH_TRIGGER, PLEJD_SERVICE_UUID};
use crate::write_queue::{DrainOutcome, FrameSink, WriteQueue};

// ----------------------------------------------------------------------------
// State and Commands
// ----------------------------------------------------------------------------

/// Link lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Idle,
    Discovering,
    Selecting,
    Connecting,
    Authenticating,
    Active,
    Reconnecting,
}

/// Requests accepted by the supervisor task
#[derive(Debug)]
pub enum LinkCommand {
    Send(MeshCommand),
    TriggerScene(u8),
    UpdateSettings(MeshSettings),
    Relink,
    Diagnostics(oneshot::Sender<LinkDiagnostics>),
    Shutdown,
}

/// Snapshot of the supervisor's resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkDiagnostics {
    pub state: LinkState,
    /// Running periodic timers (write queue drain and keepalive)
    pub active_timers: usize,
    pub notification_listeners: usize,
    pub queued_frames: usize,
    pub relinks: u64,
    pub link_address: Option<LinkAddress>,
}

enum Step {
    Transport(Option<TransportEvent>),
    Command(Option<LinkCommand>),
    Drain,
    Ping,
}

// ----------------------------------------------------------------------------
// Link Supervisor
// ----------------------------------------------------------------------------

/// Drives a [`MeshTransport`] through discovery, authentication and the
/// active link
pub struct LinkSupervisor<T: MeshTransport> {
    transport: T,
    transport_events: TransportEventReceiver,
    commands: mpsc::UnboundedReceiver<LinkCommand>,
    events: mpsc::UnboundedSender<MeshEvent>,

    // Configuration
    config: LinkConfig,
    key: MeshKey,
    catalog: Arc<Catalog>,
    scenes: Option<Arc<dyn SceneBook>>,

    // Link state
    state: LinkState,
    candidates: CandidateSet,
    linked_node: Option<NodeId>,
    linked_device: Option<CatalogDevice>,
    characteristics: CharacteristicSet,
    cipher: Option<LinkCipher>,

    // Active link resources
    queue: WriteQueue,
    keepalive: KeepaliveMonitor,
    drain_timer: Option<Interval>,
    ping_timer: Option<Interval>,
    notification_listeners: usize,

    relinks: u64,
    shutdown_requested: bool,
}

impl<T: MeshTransport> LinkSupervisor<T> {
    /// Create a supervisor around `transport`, which must report its events on
    /// the sender half of `transport_events`
    pub fn new(
        transport: T,
        transport_events: TransportEventReceiver,
        key: MeshKey,
        catalog: Arc<Catalog>,
        config: LinkConfig,
    ) -> (Self, MeshHandle, MeshEventReceiver) {
        let (command_sender, commands) = mpsc::unbounded_channel();
        let (events, event_receiver) = mpsc::unbounded_channel();

        let mut keepalive = KeepaliveMonitor::new(config.ping_interval());
        keepalive.set_verbose(config.settings.verbose);
        let scenes: Option<Arc<dyn SceneBook>> = if catalog.scenes.is_empty() {
            None
        } else {
            Some(Arc::new(catalog.scene_book()))
        };

        let supervisor = Self {
            transport,
            transport_events,
            commands,
            events,
            queue: WriteQueue::from_config(&config),
            keepalive,
            config,
            key,
            catalog,
            scenes,
            state: LinkState::Idle,
            candidates: CandidateSet::new(),
            linked_node: None,
            linked_device: None,
            characteristics: CharacteristicSet::default(),
            cipher: None,
            drain_timer: None,
            ping_timer: None,
            notification_listeners: 0,
            relinks: 0,
            shutdown_requested: false,
        };

        (supervisor, MeshHandle::new(command_sender), event_receiver)
    }

    /// Replace the scene source derived from the catalog
    pub fn with_scene_book(mut self, scenes: Arc<dyn SceneBook>) -> Self {
        self.scenes = Some(scenes);
        self
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Run until shutdown or a fatal error
    pub async fn run(mut self) -> Result<(), LinkError> {
        info!("Link supervisor starting");

        let result = self.supervise().await;
        self.teardown().await;

        match result {
            Ok(()) | Err(LinkError::Shutdown) => {
                info!("Link supervisor stopped");
                Ok(())
            }
            Err(e) => {
                error!("Link supervisor failed: {}", e);
                Err(e)
            }
        }
    }

    async fn supervise(&mut self) -> Result<(), LinkError> {
        self.establish().await?;

        while !self.shutdown_requested {
            let step = tokio::select! {
                biased;
                event = self.transport_events.recv() => Step::Transport(event),
                command = self.commands.recv() => Step::Command(command),
                _ = next_tick(&mut self.drain_timer) => Step::Drain,
                _ = next_tick(&mut self.ping_timer) => Step::Ping,
            };

            match step {
                Step::Transport(Some(event)) => self.handle_transport_event(event).await?,
                Step::Transport(None) => return Err(LinkError::EventStreamClosed),
                Step::Command(Some(command)) => {
                    if self.handle_command(command) {
                        self.relink("requested").await?;
                    }
                }
                Step::Command(None) => {
                    debug!("All mesh handles dropped");
                    self.shutdown_requested = true;
                }
                Step::Drain => self.drain_queue().await?,
                Step::Ping => self.run_keepalive().await?,
            }
        }

        Ok(())
    }

    // ------------------------------------------------------------------------
    // Establishing the link
    // ------------------------------------------------------------------------

    /// Repeat link cycles until one reaches Active or fails fatally
    async fn establish(&mut self) -> Result<(), LinkError> {
        loop {
            match self.link_cycle().await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("Link attempt failed: {}", e);
                    if e.is_connect_failure() {
                        self.emit(MeshEvent::ConnectFailed {
                            reason: e.to_string(),
                        });
                    }
                    self.state = LinkState::Reconnecting;
                    self.reset_link().await;
                    self.settle().await?;
                }
            }
        }
    }

    async fn link_cycle(&mut self) -> Result<(), LinkError> {
        self.begin_discovery().await?;
        self.settle().await?;

        let ranked = self.select_candidates().await;
        let winner = self.connect_best(ranked).await;
        if let Err(e) = self.transport.stop_scan().await {
            debug!("Failed to stop scanning: {}", e);
        }
        let winner = winner?;

        // The node's GATT database is not usable right after connecting
        self.settle().await?;

        self.bind_characteristics(&winner).await?;
        self.authenticate().await?;
        self.activate(winner).await
    }

    async fn begin_discovery(&mut self) -> Result<(), LinkError> {
        self.state = LinkState::Discovering;
        self.reset_link().await;

        while let Ok(event) = self.transport_events.try_recv() {
            trace!("Discarding stale transport event {:?}", event);
        }

        match self.transport.purge_stale_nodes(PLEJD_SERVICE_UUID).await {
            Ok(0) => {}
            Ok(purged) => info!("Removed {} stale mesh node(s)", purged),
            Err(e) => warn!("Failed to purge stale mesh nodes: {}", e),
        }

        self.transport
            .start_scan(PLEJD_SERVICE_UUID)
            .await
            .map_err(LinkError::Discovery)?;
        info!(
            "Scanning for mesh nodes for {:?}",
            self.config.connection_timeout()
        );
        Ok(())
    }

    async fn select_candidates(&mut self) -> Vec<Candidate> {
        self.state = LinkState::Selecting;
        let mut candidates = self.candidates.take();
        info!("Found {} mesh node(s)", candidates.len());

        for candidate in candidates.iter_mut() {
            match self.transport.inspect(&candidate.node).await {
                Ok(info) => {
                    candidate.enrich(info, &self.catalog);
                    debug!(
                        "Mesh node {} rssi {:?} ({})",
                        candidate.node,
                        candidate.rssi,
                        candidate
                            .device
                            .as_ref()
                            .map(|d| d.name.as_str())
                            .unwrap_or("not in catalog")
                    );
                }
                Err(e) => warn!("Failed to inspect mesh node {}: {}", candidate.node, e),
            }
        }

        rank(candidates)
    }

    async fn connect_best(&mut self, ranked: Vec<Candidate>) -> Result<Candidate, LinkError> {
        self.state = LinkState::Connecting;

        for candidate in ranked {
            info!("Connecting to mesh node {}", candidate.node);
            match self.transport.connect(&candidate.node).await {
                Ok(()) => {
                    info!("Connected to mesh node {}", candidate.node);
                    self.linked_node = Some(candidate.node.clone());
                    return Ok(candidate);
                }
                Err(e) => warn!("Unable to connect to {}: {}", candidate.node, e),
            }
        }

        Err(LinkError::NoCandidate)
    }

    async fn bind_characteristics(&mut self, winner: &Candidate) -> Result<(), LinkError> {
        let services = self.transport.services().await?;
        let service = services
            .iter()
            .find(|s| s.uuid == PLEJD_SERVICE_UUID)
            .ok_or(LinkError::MeshServiceMissing)?;

        self.characteristics = CharacteristicSet::bind(service);
        if self.characteristics.auth.is_none() {
            return Err(LinkError::AuthCharacteristicMissing);
        }
        if self.characteristics.data.is_none() {
            return Err(LinkError::DataCharacteristicMissing);
        }

        let address = winner.link_address()?;
        debug!("Deriving keystream for link address {}", address);
        self.cipher = Some(LinkCipher::new(&self.key, address));
        Ok(())
    }

    async fn authenticate(&mut self) -> Result<(), LinkError> {
        self.state = LinkState::Authenticating;
        let auth = self
            .characteristics
            .auth
            .ok_or(LinkError::AuthCharacteristicMissing)?;

        self.transport
            .write(auth, &AUTH_TRIGGER)
            .await
            .map_err(|e| LinkError::Authentication(format!("challenge request failed: {}", e)))?;
        let challenge = self
            .transport
            .read(auth)
            .await
            .map_err(|e| LinkError::Authentication(format!("challenge read failed: {}", e)))?;
        let response = crypto::challenge_response_from_slice(&self.key, &challenge)
            .map_err(|e| LinkError::Authentication(e.to_string()))?;
        self.transport
            .write(auth, &response)
            .await
            .map_err(|e| LinkError::Authentication(format!("response write failed: {}", e)))?;

        info!("Authenticated with mesh node");
        Ok(())
    }

    async fn activate(&mut self, winner: Candidate) -> Result<(), LinkError> {
        let address = self
            .cipher
            .as_ref()
            .map(|c| *c.address())
            .ok_or_else(|| LinkError::Authentication("no keystream bound".to_string()))?;

        match self.characteristics.last_data {
            Some(last_data) => {
                self.transport.subscribe(last_data).await?;
                self.notification_listeners += 1;
            }
            None => warn!("Mesh node has no notification characteristic; state updates disabled"),
        }

        self.drain_timer = Some(periodic(self.config.write_queue_wait()));
        if self.config.keep_alive {
            if self.characteristics.ping.is_some() {
                self.ping_timer = Some(periodic(self.keepalive.interval()));
            } else {
                warn!("Mesh node has no ping characteristic; keepalive disabled");
            }
        }

        self.state = LinkState::Active;
        self.linked_device = winner.device;
        info!("Mesh link active via {}", address);
        self.emit(MeshEvent::Connected {
            address,
            device: self.linked_device.clone(),
        });
        Ok(())
    }

    /// Wait out the connection timeout while still serving commands
    async fn settle(&mut self) -> Result<(), LinkError> {
        let deadline = Instant::now() + self.config.connection_timeout();
        self.idle_until(deadline).await
    }

    async fn idle_until(&mut self, deadline: Instant) -> Result<(), LinkError> {
        loop {
            let step = tokio::select! {
                biased;
                event = self.transport_events.recv() => Step::Transport(event),
                command = self.commands.recv() => Step::Command(command),
                _ = sleep_until(deadline) => return Ok(()),
            };

            match step {
                Step::Transport(Some(event)) => self.observe_while_linking(event),
                Step::Transport(None) => return Err(LinkError::EventStreamClosed),
                Step::Command(Some(command)) => {
                    if self.handle_command(command) {
                        debug!("Relink requested while the link is {:?}; ignoring", self.state);
                    }
                }
                Step::Command(None) => self.shutdown_requested = true,
                Step::Drain | Step::Ping => {}
            }

            if self.shutdown_requested {
                return Err(LinkError::Shutdown);
            }
        }
    }

    fn observe_while_linking(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::NodeDiscovered { node, services }
                if self.state == LinkState::Discovering =>
            {
                self.candidates.observe(node, &services, PLEJD_SERVICE_UUID);
            }
            other => trace!("Ignoring {:?} while the link is {:?}", other, self.state),
        }
    }

    // ------------------------------------------------------------------------
    // Active link
    // ------------------------------------------------------------------------

    async fn handle_transport_event(&mut self, event: TransportEvent) -> Result<(), LinkError> {
        match event {
            TransportEvent::Notification {
                characteristic,
                value,
            } => {
                self.handle_notification(characteristic, &value);
                Ok(())
            }
            TransportEvent::Disconnected { node } => {
                if self.linked_node.as_ref() == Some(&node) {
                    warn!("Mesh node {} disconnected", node);
                    self.relink("node disconnected").await
                } else {
                    trace!("Ignoring disconnect from {}", node);
                    Ok(())
                }
            }
            TransportEvent::NodeDiscovered { node, .. } => {
                trace!("Ignoring discovery of {} on an active link", node);
                Ok(())
            }
        }
    }

    fn handle_notification(&mut self, characteristic: Uuid, value: &[u8]) {
        if self.characteristics.last_data != Some(characteristic) {
            trace!("Ignoring notification from {}", characteristic);
            return;
        }
        let Some(cipher) = self.cipher.as_ref() else {
            return;
        };

        let frame = cipher.apply(value);
        if self.config.settings.verbose {
            info!("Received frame {}", hex::encode(&frame));
        }
        if let Some(event) = codec::decode(&frame) {
            self.emit(event.into());
        }
    }

    async fn drain_queue(&mut self) -> Result<(), LinkError> {
        if self.state != LinkState::Active || self.queue.is_empty() {
            return Ok(());
        }
        let (Some(data), Some(cipher)) = (self.characteristics.data, self.cipher.as_ref()) else {
            return Ok(());
        };

        let mut writer = LinkWriter {
            transport: &mut self.transport,
            cipher,
            characteristic: data,
            verbose: self.config.settings.verbose,
        };

        match self.queue.drain(&mut writer).await {
            DrainOutcome::Drained(sent) => {
                trace!("Wrote {} frame(s)", sent);
                Ok(())
            }
            DrainOutcome::Relink {
                sent,
                cause,
                dropped,
            } => {
                warn!("Write failed after {} frame(s): {}", sent, cause);
                if let Some(frame) = dropped {
                    self.emit(MeshEvent::SendFailed {
                        device: frame.device(),
                        reason: cause.to_string(),
                    });
                }
                self.relink("write failed").await
            }
        }
    }

    async fn run_keepalive(&mut self) -> Result<(), LinkError> {
        let Some(ping) = self.characteristics.ping else {
            return Ok(());
        };

        match self.keepalive.ping(&mut self.transport, ping).await {
            PingOutcome::Success(value) => {
                self.emit(MeshEvent::PingSuccess { value });
                Ok(())
            }
            PingOutcome::Failed(reason) => {
                warn!("Keepalive failed: {}", reason);
                self.emit(MeshEvent::PingFailed { reason });
                self.relink("keepalive failed").await
            }
        }
    }

    /// Tear down the active link and establish a new one.
    ///
    /// Only an active link can be relinked. Requests arriving while a link is
    /// being established are no-ops, so concurrent triggers collapse into one.
    async fn relink(&mut self, reason: &str) -> Result<(), LinkError> {
        if self.state != LinkState::Active {
            debug!("Relink ({}) ignored while the link is {:?}", reason, self.state);
            return Ok(());
        }

        warn!("Relinking: {}", reason);
        self.state = LinkState::Reconnecting;
        self.relinks += 1;
        self.reset_link().await;
        self.settle().await?;
        self.establish().await
    }

    /// Release every resource held for the current link
    async fn reset_link(&mut self) {
        self.drain_timer = None;
        self.ping_timer = None;

        if self.notification_listeners > 0 {
            if let Err(e) = self.transport.unsubscribe_all().await {
                debug!("Failed to unsubscribe: {}", e);
            }
            self.notification_listeners = 0;
        }

        if let Some(node) = self.linked_node.take() {
            debug!("Disconnecting from mesh node {}", node);
            if let Err(e) = self.transport.disconnect().await {
                debug!("Failed to disconnect from {}: {}", node, e);
            }
        }

        self.characteristics.clear();
        self.cipher = None;
        self.linked_device = None;
        self.candidates.clear();
    }

    async fn teardown(&mut self) {
        self.reset_link().await;
        if let Err(e) = self.transport.stop_scan().await {
            trace!("Failed to stop scanning during teardown: {}", e);
        }
        self.state = LinkState::Idle;
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Apply a command that never suspends. Returns true for a relink request,
    /// which the caller decides how to serve.
    fn handle_command(&mut self, command: LinkCommand) -> bool {
        match command {
            LinkCommand::Send(command) => self.enqueue(command),
            LinkCommand::TriggerScene(scene) => self.trigger_scene(scene),
            LinkCommand::UpdateSettings(settings) => self.apply_settings(settings),
            LinkCommand::Diagnostics(reply) => {
                let _ = reply.send(self.diagnostics());
            }
            LinkCommand::Shutdown => {
                info!("Link supervisor shutdown requested");
                self.shutdown_requested = true;
            }
            LinkCommand::Relink => return true,
        }
        false
    }

    fn enqueue(&mut self, command: MeshCommand) {
        let frame = codec::encode(&command);
        if self.config.settings.verbose {
            info!("Queueing {:?} as {}", command, frame);
        }
        self.queue.enqueue(frame);
    }

    fn trigger_scene(&mut self, scene: u8) {
        let steps = self.scenes.as_ref().and_then(|book| book.steps(scene));
        match steps {
            Some(steps) => {
                info!("Triggering scene {} ({} step(s))", scene, steps.len());
                for command in steps {
                    self.enqueue(command);
                }
            }
            None => warn!("Unknown scene {}", scene),
        }
    }

    fn apply_settings(&mut self, settings: MeshSettings) {
        info!("Applying settings: verbose={}", settings.verbose);
        self.config.settings = settings;
        self.keepalive.set_verbose(settings.verbose);
    }

    fn diagnostics(&self) -> LinkDiagnostics {
        LinkDiagnostics {
            state: self.state,
            active_timers: usize::from(self.drain_timer.is_some())
                + usize::from(self.ping_timer.is_some()),
            notification_listeners: self.notification_listeners,
            queued_frames: self.queue.len(),
            relinks: self.relinks,
            link_address: self.cipher.as_ref().map(|c| *c.address()),
        }
    }

    fn emit(&self, event: MeshEvent) {
        if self.events.send(event).is_err() {
            trace!("No mesh event listener");
        }
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

/// Encrypts frames and writes them to the data characteristic
struct LinkWriter<'a, T: MeshTransport> {
    transport: &'a mut T,
    cipher: &'a LinkCipher,
    characteristic: Uuid,
    verbose: bool,
}

#[async_trait]
impl<'a, T: MeshTransport> FrameSink for LinkWriter<'a, T> {
    async fn send(&mut self, frame: &OutboundFrame) -> Result<(), TransportError> {
        if self.verbose {
            info!("Writing frame {}", frame);
        }
        let payload = self.cipher.apply(frame.as_bytes());
        self.transport.write(self.characteristic, &payload).await
    }
}

fn periodic(period: Duration) -> Interval {
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
