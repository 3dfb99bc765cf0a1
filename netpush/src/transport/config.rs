//! SSH connection configuration.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::error::{Result, TransportError};

/// Host key verification mode, analogous to OpenSSH's `StrictHostKeyChecking`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HostKeyVerification {
    /// Reject unknown and changed keys.
    Strict,

    /// Accept and auto-learn unknown keys, but reject changed keys.
    #[default]
    AcceptNew,

    /// Accept all keys without checking. For lab use only.
    Disabled,
}

/// SSH connection configuration.
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// Target host (hostname or IP address).
    pub host: String,

    /// SSH port (default: 22).
    pub port: u16,

    /// Username for authentication.
    pub username: String,

    /// Authentication method.
    pub auth: AuthMethod,

    /// Connection and login timeout.
    pub timeout: Duration,

    /// Upper bound for any single read on the interactive channel.
    pub read_timeout: Duration,

    /// Terminal width for PTY.
    pub terminal_width: u32,

    /// Terminal height for PTY.
    pub terminal_height: u32,

    /// Host key verification mode.
    pub host_key_verification: HostKeyVerification,

    /// Path to known_hosts file.
    pub known_hosts_path: Option<PathBuf>,
}

impl SshConfig {
    /// Create a configuration with default port, timeouts and terminal size.
    pub fn new(host: impl Into<String>, username: impl Into<String>, auth: AuthMethod) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: username.into(),
            auth,
            timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
            terminal_width: 511,
            terminal_height: 24,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
        }
    }

    /// Get the socket address for connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Reject parameters that can never produce a working session.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| -> Result<()> {
            Err(TransportError::InvalidParams {
                message: message.to_string(),
            }
            .into())
        };

        if self.host.trim().is_empty() {
            return invalid("host is empty");
        }
        if self.username.trim().is_empty() {
            return invalid("username is empty");
        }
        if self.port == 0 {
            return invalid("port must be non-zero");
        }
        if self.timeout.is_zero() {
            return invalid("timeout must be positive");
        }
        if self.read_timeout.is_zero() {
            return invalid("read timeout must be positive");
        }
        if matches!(self.auth, AuthMethod::None) {
            return invalid("no credentials supplied");
        }
        Ok(())
    }
}

/// Authentication method for SSH connections.
pub enum AuthMethod {
    /// No authentication. Rejected by [`SshConfig::validate`].
    None,

    /// Password authentication.
    Password(SecretString),

    /// Private key authentication.
    PrivateKey {
        /// Path to the private key file.
        path: PathBuf,
        /// Optional passphrase for encrypted keys.
        passphrase: Option<SecretString>,
    },
}

impl Clone for AuthMethod {
    fn clone(&self) -> Self {
        let copy = |s: &SecretString| SecretString::from(s.expose_secret().to_owned());
        match self {
            AuthMethod::None => AuthMethod::None,
            AuthMethod::Password(password) => AuthMethod::Password(copy(password)),
            AuthMethod::PrivateKey { path, passphrase } => AuthMethod::PrivateKey {
                path: path.clone(),
                passphrase: passphrase.as_ref().map(copy),
            },
        }
    }
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::None => f.write_str("None"),
            AuthMethod::Password(_) => f.write_str("Password(<redacted>)"),
            AuthMethod::PrivateKey { path, .. } => {
                f.debug_struct("PrivateKey").field("path", path).finish()
            }
        }
    }
}
