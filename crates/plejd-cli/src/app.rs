//! Application state and the interactive link loop

use std::sync::Arc;

use plejd_ble::{platform_link, MeshHandle};
use plejd_core::{crypto, Catalog, DeviceAddress, LinkAddress, MeshEvent, MeshKey, MeshSettings};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::{CliError, Result};
use crate::operator::OperatorCommand;

/// Validated configuration plus the key and catalog it resolves to
pub struct PlejdApp {
    config: AppConfig,
    key: MeshKey,
    catalog: Arc<Catalog>,
}

impl PlejdApp {
    pub fn new(config: AppConfig) -> Result<Self> {
        config.validate()?;
        let key = config.mesh_key()?;
        let catalog = config.load_catalog()?;
        info!(
            "Catalog has {} device(s) and {} scene(s)",
            catalog.len(),
            catalog.scenes.len()
        );

        Ok(Self {
            config,
            key,
            catalog: Arc::new(catalog),
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Keystream the link would use with the node at `address`
    pub fn keystream(&self, address: &str) -> Result<String> {
        let address = LinkAddress::from_platform_address(address)?;
        Ok(hex::encode(crypto::derive_keystream(&self.key, &address)))
    }

    /// Run the link until the operator quits, stdin closes or the link fails
    pub async fn run(self) -> Result<()> {
        let (supervisor, handle, mut events) = platform_link(
            self.key,
            self.catalog.clone(),
            self.config.link.clone(),
        )
        .await?;
        let mut link = tokio::spawn(supervisor.run());
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        info!("Link started; type commands or 'quit'");
        loop {
            tokio::select! {
                result = &mut link => {
                    return match result {
                        Ok(outcome) => outcome.map_err(CliError::from),
                        Err(e) => Err(CliError::Runtime(e.to_string())),
                    };
                }
                Some(event) = events.recv() => print_event(&event)?,
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        info!("stdin closed");
                        break;
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match line.parse::<OperatorCommand>() {
                        Ok(OperatorCommand::Quit) => break,
                        Ok(command) => dispatch(&handle, &self.catalog, command).await?,
                        Err(e) => warn!("{}", e),
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    break;
                }
            }
        }

        handle.shutdown()?;
        match link.await {
            Ok(outcome) => outcome.map_err(CliError::from),
            Err(e) => Err(CliError::Runtime(e.to_string())),
        }
    }
}

async fn dispatch(handle: &MeshHandle, catalog: &Catalog, command: OperatorCommand) -> Result<()> {
    match command {
        OperatorCommand::On { device, brightness } => {
            if let Some(warning) = target_warning(catalog, device, brightness) {
                warn!("{}", warning);
            }
            handle.turn_on(device, brightness)?
        }
        OperatorCommand::Off { device } => {
            if let Some(warning) = target_warning(catalog, device, None) {
                warn!("{}", warning);
            }
            handle.turn_off(device)?
        }
        OperatorCommand::Scene(scene) => handle.trigger_scene(scene)?,
        OperatorCommand::Verbose(verbose) => handle.update_settings(MeshSettings { verbose })?,
        OperatorCommand::Relink => handle.relink()?,
        OperatorCommand::Status => {
            let diagnostics = handle.diagnostics().await?;
            println!("{}", serde_json::to_string(&diagnostics)?);
        }
        OperatorCommand::Quit => {}
    }
    Ok(())
}

/// Events go to stdout as one JSON object per line
fn print_event(event: &MeshEvent) -> Result<()> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}

/// Why a command to `device` may not do what the operator expects. The
/// command is still sent; the catalog can lag behind the mesh.
fn target_warning(catalog: &Catalog, device: DeviceAddress, brightness: Option<u8>) -> Option<String> {
    if catalog.is_empty() {
        return None;
    }
    match catalog.find_by_address(device) {
        None => Some(format!("Device {} is not in the catalog", device)),
        Some(entry) if brightness.is_some() && !entry.dimmable => Some(format!(
            "{} ({}) is not dimmable; brightness will be ignored",
            entry.name, device
        )),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plejd_core::{CatalogDevice, DeviceType};

    fn device(address: DeviceAddress, name: &str, dimmable: bool) -> CatalogDevice {
        CatalogDevice {
            address,
            serial_number: None,
            name: name.to_string(),
            dimmable,
            room: None,
            device_type: DeviceType::Light,
            output_index: 0,
        }
    }

    #[test]
    fn test_target_warning_without_catalog() {
        assert_eq!(target_warning(&Catalog::default(), 9, Some(10)), None);
    }

    #[test]
    fn test_target_warning_for_unknown_and_undimmable_devices() {
        let catalog = Catalog::new(vec![device(11, "Kitchen", true), device(12, "Porch", false)]);

        assert_eq!(target_warning(&catalog, 11, Some(128)), None);
        assert_eq!(target_warning(&catalog, 12, None), None);
        assert!(target_warning(&catalog, 12, Some(128))
            .unwrap()
            .contains("not dimmable"));
        assert!(target_warning(&catalog, 40, None)
            .unwrap()
            .contains("not in the catalog"));
    }
}
