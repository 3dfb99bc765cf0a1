//! The transport session contract.
//!
//! Drivers never talk to russh directly. They are written against
//! [`Session`], a handful of terminal primitives, and get one from a
//! [`Connector`]. [`SshConnector`] is the production implementation.

mod shell;
mod ssh;

#[cfg(test)]
pub(crate) mod mock;

pub use ssh::{SshConnector, SshSession};

use std::future::Future;
use std::time::Duration;

use regex::bytes::Regex;

use crate::error::{Result, TransportError};
use crate::inventory::DeviceDescriptor;
use crate::platform::VendorSyntax;
use crate::transport::SshConfig;

/// Everything needed to open an interactive session to one device.
#[derive(Debug, Clone)]
pub struct ConnectParams {
    /// Inventory name of the device, used in logs and errors.
    pub device: String,

    /// Device type string from the inventory.
    pub device_type: String,

    /// SSH connection settings.
    pub ssh: SshConfig,

    /// Pattern that marks the device prompt.
    pub prompt_pattern: Regex,

    /// Commands run once after login, before anything else.
    pub on_open_commands: Vec<String>,
}

impl ConnectParams {
    /// Build connection parameters from an inventory entry and the syntax
    /// table of its vendor.
    pub fn new(device: &DeviceDescriptor, syntax: &VendorSyntax) -> Self {
        Self {
            device: device.name.clone(),
            device_type: device.device_type.clone(),
            ssh: device.ssh_config(),
            prompt_pattern: syntax.prompt_pattern.clone(),
            on_open_commands: syntax.on_open_commands.clone(),
        }
    }

    /// Reject parameters before any network I/O happens.
    pub fn validate(&self) -> Result<()> {
        if self.device_type.trim().is_empty() {
            return Err(TransportError::InvalidParams {
                message: format!("device '{}' has no device type", self.device),
            }
            .into());
        }
        self.ssh.validate()
    }
}

/// One open interactive terminal session.
///
/// All reads strip terminal escape sequences. Output is returned lossily
/// decoded as UTF-8.
pub trait Session: Send {
    /// Send a bare return and return the prompt the device prints.
    fn capture_prompt(&mut self) -> impl Future<Output = Result<String>> + Send;

    /// Send one line and read until `pattern` matches or `timeout` elapses.
    fn send_line_expect(
        &mut self,
        text: &str,
        pattern: &Regex,
        timeout: Duration,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Send one line and read until the channel has been quiet for `settle`.
    ///
    /// Only fails on channel I/O errors, never on missing patterns.
    fn send_line_timed(
        &mut self,
        text: &str,
        settle: Duration,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Send several lines as one unit and read until the prompt that follows
    /// the last line's echo, within `timeout` for the whole block.
    ///
    /// With `verify`, each line's echo is awaited before the next is written.
    fn send_block(
        &mut self,
        lines: &[String],
        timeout: Duration,
        verify: bool,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Release the channel and the connection.
    fn close(self) -> impl Future<Output = Result<()>> + Send;
}

/// Opens [`Session`]s.
pub trait Connector: Send + Sync {
    /// The session type this connector produces.
    type Session: Session;

    /// Open a session. Parameters are validated before dialing.
    fn open(&self, params: &ConnectParams) -> impl Future<Output = Result<Self::Session>> + Send;
}
