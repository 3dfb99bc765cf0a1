//! [`Session`] over an SSH PTY.

use std::time::Duration;

use log::debug;
use regex::bytes::Regex;
use russh::Channel;
use russh::client::Msg;

use super::shell::Shell;
use super::{ConnectParams, Connector, Session};
use crate::channel::{PtyChannel, PtyConfig};
use crate::error::Result;
use crate::transport::SshTransport;

/// Opens [`SshSession`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct SshConnector;

impl Connector for SshConnector {
    type Session = SshSession;

    async fn open(&self, params: &ConnectParams) -> Result<SshSession> {
        SshSession::open(params).await
    }
}

/// An interactive shell on a network device.
pub struct SshSession {
    device: String,
    transport: SshTransport,
    shell: Shell<Channel<Msg>>,
}

impl SshSession {
    /// Connect, authenticate, open a shell and wait for the first prompt.
    ///
    /// The vendor's post-login commands (paging off and the like) run before
    /// this returns. If anything fails after the connection is up, the
    /// connection is closed before the error is returned. Every failure is a
    /// transport error.
    pub async fn open(params: &ConnectParams) -> Result<Self> {
        params.validate()?;

        let transport = SshTransport::connect(params.ssh.clone()).await?;
        let channel = match transport.open_channel().await {
            Ok(channel) => channel,
            Err(e) => {
                if let Err(close_err) = transport.close().await {
                    debug!("close after failed channel open: {}", close_err);
                }
                return Err(e);
            }
        };

        let mut session = Self {
            device: params.device.clone(),
            transport,
            shell: Shell::new(params, PtyChannel::new(channel, PtyConfig::default())),
        };

        if let Err(e) = session.shell.login(params).await {
            if let Err(close_err) = session.close().await {
                debug!("close after failed login: {}", close_err);
            }
            return Err(e);
        }

        debug!("session to {} ready", params.device);
        Ok(session)
    }
}

impl Session for SshSession {
    async fn capture_prompt(&mut self) -> Result<String> {
        self.shell.capture_prompt().await
    }

    async fn send_line_expect(
        &mut self,
        text: &str,
        pattern: &Regex,
        timeout: Duration,
    ) -> Result<String> {
        self.shell.send_line_expect(text, pattern, timeout).await
    }

    async fn send_line_timed(&mut self, text: &str, settle: Duration) -> Result<String> {
        self.shell.send_line_timed(text, settle).await
    }

    async fn send_block(&mut self, lines: &[String], timeout: Duration, verify: bool) -> Result<String> {
        self.shell.send_block(lines, timeout, verify).await
    }

    async fn close(self) -> Result<()> {
        debug!("closing session to {}", self.device);
        if let Err(e) = self.shell.close().await {
            debug!("channel close for {}: {}", self.device, e);
        }
        self.transport.close().await
    }
}
