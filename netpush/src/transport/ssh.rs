//! Connection setup, authentication and host key checks.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use russh::Channel;
use russh::client::{self, Handle, Msg};
use russh::keys::{PrivateKeyWithHashAlg, PublicKey, known_hosts, load_secret_key};
use secrecy::ExposeSecret;

use super::config::{AuthMethod, HostKeyVerification, SshConfig};
use crate::error::{Result, TransportError};

/// An authenticated SSH connection to one device.
pub struct SshTransport {
    /// The russh session handle.
    session: Handle<SshHandler>,

    /// Configuration used for this connection.
    config: SshConfig,
}

impl SshTransport {
    /// Dial, verify the host key and authenticate, each bounded by the connect timeout.
    pub async fn connect(config: SshConfig) -> Result<Self> {
        config.validate()?;

        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: Some(config.read_timeout.max(config.timeout)),
            ..Default::default()
        });

        let host_key_error: Arc<Mutex<Option<TransportError>>> = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            host: config.host.clone(),
            port: config.port,
            host_key_verification: config.host_key_verification.clone(),
            known_hosts_path: config.known_hosts_path.clone(),
            host_key_error: host_key_error.clone(),
        };

        debug!("connecting to {}", config.socket_addr());

        let mut session = tokio::time::timeout(
            config.timeout,
            client::connect(ssh_config, (config.host.as_str(), config.port), handler),
        )
        .await
        .map_err(|_| TransportError::Timeout(config.timeout))?
        .map_err(|e| {
            // Prefer the detailed host-key error over russh's generic UnknownKey
            if let Some(hk_err) = host_key_error.lock().ok().and_then(|mut slot| slot.take()) {
                return hk_err;
            }
            match e {
                russh::Error::IO(source) => TransportError::ConnectionFailed {
                    host: config.host.clone(),
                    port: config.port,
                    source,
                },
                other => TransportError::Ssh(other),
            }
        })?;

        tokio::time::timeout(config.timeout, Self::authenticate(&mut session, &config))
            .await
            .map_err(|_| TransportError::Timeout(config.timeout))??;

        debug!("authenticated to {} as {}", config.host, config.username);

        Ok(Self { session, config })
    }

    /// Open a new PTY channel with an interactive shell on this connection.
    pub async fn open_channel(&self) -> Result<Channel<Msg>> {
        let channel = self
            .session
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_pty(
                true,
                "xterm",
                self.config.terminal_width,
                self.config.terminal_height,
                0,
                0,
                &[],
            )
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_shell(true)
            .await
            .map_err(TransportError::Ssh)?;

        Ok(channel)
    }

    /// Configuration this transport was opened with.
    pub fn config(&self) -> &SshConfig {
        &self.config
    }

    /// Authenticate with the configured credentials.
    async fn authenticate(session: &mut Handle<SshHandler>, config: &SshConfig) -> Result<()> {
        let user = config.username.as_str();
        let answer = match &config.auth {
            AuthMethod::None => {
                return Err(TransportError::InvalidParams {
                    message: "no credentials supplied".to_string(),
                }
                .into());
            }
            AuthMethod::Password(password) => {
                session
                    .authenticate_password(user, password.expose_secret())
                    .await
            }
            AuthMethod::PrivateKey { path, passphrase } => {
                let key = load_secret_key(path, passphrase.as_ref().map(|p| p.expose_secret()))
                    .map_err(|e| TransportError::Key(e.to_string()))?;
                let hash_alg = session
                    .best_supported_rsa_hash()
                    .await
                    .map_err(TransportError::Ssh)?
                    .flatten();
                session
                    .authenticate_publickey(user, PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg))
                    .await
            }
        };

        if answer.map_err(TransportError::Ssh)?.success() {
            Ok(())
        } else {
            Err(TransportError::AuthenticationFailed {
                user: user.to_string(),
            }
            .into())
        }
    }

    /// Close the connection.
    pub async fn close(self) -> Result<()> {
        debug!("disconnecting from {}", self.config.host);
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(TransportError::Ssh)?;
        Ok(())
    }
}

/// russh client handler. Only host key verification is customised.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    /// Why the last host key was rejected, for connect() to report.
    host_key_error: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    /// Decide whether to trust `key` under the configured policy.
    ///
    /// Unknown keys are learned under `AcceptNew`. A key that differs from
    /// the known_hosts entry is always rejected.
    fn verify(&self, key: &PublicKey) -> std::result::Result<(), TransportError> {
        if self.host_key_verification == HostKeyVerification::Disabled {
            return Ok(());
        }

        let known = match &self.known_hosts_path {
            Some(path) => russh::keys::check_known_hosts_path(&self.host, self.port, key, path),
            None => russh::keys::check_known_hosts(&self.host, self.port, key),
        };

        match known {
            Ok(true) => Ok(()),
            Ok(false) if self.host_key_verification == HostKeyVerification::Strict => {
                Err(TransportError::HostKeyUnknown {
                    host: self.host.clone(),
                    port: self.port,
                })
            }
            Ok(false) => {
                let learned = match &self.known_hosts_path {
                    Some(path) => known_hosts::learn_known_hosts_path(&self.host, self.port, key, path),
                    None => known_hosts::learn_known_hosts(&self.host, self.port, key),
                };
                if let Err(e) = learned {
                    warn!("could not record host key for {}: {}", self.host, e);
                }
                Ok(())
            }
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        match self.verify(server_public_key) {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!("rejecting host key for {}:{}: {}", self.host, self.port, e);
                if let Ok(mut slot) = self.host_key_error.lock() {
                    *slot = Some(e);
                }
                Ok(false)
            }
        }
    }
}
