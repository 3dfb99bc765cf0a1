//! Error types for netpush.
//!
//! Errors are layered the same way the crate is: transport (opening the SSH
//! connection), channel (reading and writing the interactive PTY), driver
//! (the configuration protocol), vendor (syntax tables and driver lookup) and
//! inventory. [`Error::kind`] folds any of them into the coarse taxonomy the
//! drivers and the fleet runner reason about.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for netpush operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel operation errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Driver-level errors
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// Vendor syntax and registry errors
    #[error("Vendor error: {0}")]
    Vendor(#[from] VendorError),

    /// Inventory loading and validation errors
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The session could not be opened. Nothing was sent to the device.
    Connect,
    /// A step exceeded its time bound.
    Timeout,
    /// No driver is registered for the device's vendor id.
    UnknownVendor,
    /// The device prompt could not be read back.
    PromptDetection,
    /// Anything else (channel I/O, bad input, inventory problems).
    Other,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport(_) => ErrorKind::Connect,
            Error::Channel(ChannelError::PatternTimeout(_)) => ErrorKind::Timeout,
            Error::Channel(_) => ErrorKind::Other,
            Error::Driver(DriverError::PromptDetection { .. }) => ErrorKind::PromptDetection,
            Error::Driver(_) => ErrorKind::Other,
            Error::Vendor(VendorError::UnknownVendor { .. }) => ErrorKind::UnknownVendor,
            Error::Vendor(_) | Error::Inventory(_) => ErrorKind::Other,
        }
    }

    /// Whether this error is a step timeout.
    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }
}

/// Transport layer errors (SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection parameters were rejected before dialing
    #[error("Invalid connection parameters: {message}")]
    InvalidParams { message: String },

    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Host key differs from the one recorded in known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// Host is not in known_hosts and strict checking is enabled
    #[error("Host key for {host}:{port} is not in known_hosts")]
    HostKeyUnknown { host: String, port: u16 },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// The device never presented a prompt after login
    #[error("No prompt from {host} within {timeout:?}")]
    NoInitialPrompt { host: String, timeout: Duration },

    /// The shell opened but failed before it was ready for use
    #[error("Session setup on {host} failed: {source}")]
    Setup {
        host: String,
        #[source]
        source: Box<Error>,
    },

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Channel layer errors (pattern matching, PTY operations).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Pattern matching timed out
    #[error("Pattern not found within {0:?}")]
    PatternTimeout(Duration),

    /// Channel closed unexpectedly
    #[error("Channel closed")]
    Closed,

    /// SSH protocol error on the channel
    #[error("Channel SSH error: {0}")]
    Ssh(russh::Error),

    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Driver layer errors (configuration protocol).
#[derive(Error, Debug)]
pub enum DriverError {
    /// The prompt could not be captured
    #[error("Prompt detection failed: {message}")]
    PromptDetection { message: String },

    /// The device answered a command with a failure marker
    #[error("Device rejected '{command}': {message}")]
    Rejected { command: String, message: String },

    /// A configuration command list was malformed
    #[error("Invalid command list: {message}")]
    InvalidCommands { message: String },
}

/// Vendor syntax table and driver registry errors.
#[derive(Error, Debug)]
pub enum VendorError {
    /// No driver registered for this vendor id
    #[error("No driver registered for vendor '{vendor}'")]
    UnknownVendor { vendor: String },

    /// A driver is already registered for this vendor id
    #[error("A driver is already registered for vendor '{vendor}'")]
    AlreadyRegistered { vendor: String },

    /// A syntax table is missing something its driver family requires
    #[error("Invalid syntax table for '{vendor}': {message}")]
    InvalidSyntax { vendor: String, message: String },

    /// Syntax override file could not be read
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Syntax override file could not be parsed
    #[error("Failed to parse syntax overrides: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Inventory loading and validation errors.
#[derive(Error, Debug)]
pub enum InventoryError {
    /// Inventory file could not be read
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Inventory YAML is malformed
    #[error("Failed to parse inventory: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Inventory failed validation
    #[error("Inventory has {} error(s): {}", .errors.len(), .errors.join("; "))]
    Invalid { errors: Vec<String> },

    /// Device name not present in the inventory
    #[error("Device '{name}' not found in inventory")]
    DeviceNotFound { name: String },
}

/// Result type alias using netpush's Error.
pub type Result<T> = std::result::Result<T, Error>;
