//! Runs one command list against one device.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::command::ConfigCommandList;
use crate::driver::{DriverRegistry, SessionResult};
use crate::error::Result;
use crate::inventory::DeviceDescriptor;
use crate::session::{ConnectParams, Connector, Session};

/// Owns the session lifecycle for one device at a time.
///
/// Sessions are opened per call and always closed before the call returns,
/// whatever the driver did. A driver panic is already folded into a fatal
/// [`SessionResult`] by [`VendorDriver::apply`](crate::driver::VendorDriver::apply).
pub struct SessionOrchestrator<C> {
    registry: Arc<DriverRegistry>,
    connector: C,
}

impl<C: Connector> SessionOrchestrator<C> {
    pub fn new(registry: Arc<DriverRegistry>, connector: C) -> Self {
        Self {
            registry,
            connector,
        }
    }

    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Apply `commands` to `device` and return the driver's result unchanged.
    ///
    /// The driver is looked up first since its prompt pattern is needed to
    /// open the session. An unknown vendor or a failed open is an error and
    /// no command is sent.
    pub async fn run_one_device(
        &self,
        device: &DeviceDescriptor,
        commands: &ConfigCommandList,
    ) -> Result<SessionResult> {
        let driver = self.registry.get(device.vendor)?;
        let params = ConnectParams::new(device, driver.syntax());

        info!("{}: connecting to {}", device.name, device.host);
        let mut session = self.connector.open(&params).await?;

        let result = driver.apply(&mut session, commands).await;

        if let Err(e) = session.close().await {
            warn!("{}: error closing session: {}", device.name, e);
        }

        info!(
            "{}: {:?} after {} step(s)",
            device.name,
            result.status,
            result.transcript.len()
        );
        Ok(result)
    }

    /// Open a session, read the prompt and close again. Nothing is configured.
    pub async fn probe(&self, device: &DeviceDescriptor) -> Result<String> {
        let driver = self.registry.get(device.vendor)?;
        let params = ConnectParams::new(device, driver.syntax());

        let mut session = self.connector.open(&params).await?;
        let prompt = session.capture_prompt().await;
        if let Err(e) = session.close().await {
            warn!("{}: error closing probe session: {}", device.name, e);
        }
        debug!("{}: probe prompt {:?}", device.name, prompt.as_ref().ok());
        prompt
    }
}
