//! Cloneable upstream handle to a running link supervisor

use plejd_core::{DeviceAddress, MeshCommand, MeshEvent, MeshSettings};
use tokio::sync::{mpsc, oneshot};

use crate::error::LinkError;
use crate::supervisor::{LinkCommand, LinkDiagnostics};

pub type MeshEventReceiver = mpsc::UnboundedReceiver<MeshEvent>;

/// Issues commands to a [`crate::LinkSupervisor`]
///
/// Commands are accepted in any link state. Frames queued while the link is
/// down go out once it is active again.
#[derive(Debug, Clone)]
pub struct MeshHandle {
    commands: mpsc::UnboundedSender<LinkCommand>,
}

impl MeshHandle {
    pub(crate) fn new(commands: mpsc::UnboundedSender<LinkCommand>) -> Self {
        Self { commands }
    }

    fn submit(&self, command: LinkCommand) -> Result<(), LinkError> {
        self.commands
            .send(command)
            .map_err(|_| LinkError::Shutdown)
    }

    /// Turn a device on, optionally at a brightness
    pub fn turn_on(&self, device: DeviceAddress, brightness: Option<u8>) -> Result<(), LinkError> {
        self.send(MeshCommand::TurnOn { device, brightness })
    }

    pub fn turn_off(&self, device: DeviceAddress) -> Result<(), LinkError> {
        self.send(MeshCommand::TurnOff { device })
    }

    pub fn send(&self, command: MeshCommand) -> Result<(), LinkError> {
        self.submit(LinkCommand::Send(command))
    }

    /// Replay the commands a scene stands for
    pub fn trigger_scene(&self, scene: u8) -> Result<(), LinkError> {
        self.submit(LinkCommand::TriggerScene(scene))
    }

    pub fn update_settings(&self, settings: MeshSettings) -> Result<(), LinkError> {
        self.submit(LinkCommand::UpdateSettings(settings))
    }

    /// Tear the link down and establish it again. Ignored unless the link is active.
    pub fn relink(&self) -> Result<(), LinkError> {
        self.submit(LinkCommand::Relink)
    }

    pub async fn diagnostics(&self) -> Result<LinkDiagnostics, LinkError> {
        let (reply, response) = oneshot::channel();
        self.submit(LinkCommand::Diagnostics(reply))?;
        response.await.map_err(|_| LinkError::Shutdown)
    }

    pub fn shutdown(&self) -> Result<(), LinkError> {
        self.submit(LinkCommand::Shutdown)
    }
}
