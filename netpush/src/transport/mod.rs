//! SSH connection layer on top of russh.
//!
//! Dials the device, verifies its host key, authenticates and opens the
//! PTY shell channel the session layer talks through.

pub mod config;
mod ssh;

pub use config::{AuthMethod, HostKeyVerification, SshConfig};
pub use ssh::SshTransport;
