//! Terminal primitives over a [`PtyChannel`].
//!
//! Everything [`SshSession`](super::SshSession) does once the shell is open
//! lives here, independent of how the bytes travel.

use std::time::Duration;

use log::{debug, warn};
use regex::bytes::Regex;
use tokio::time::Instant;

use super::{ConnectParams, Session};
use crate::channel::{ChannelIo, PtyChannel, last_line};
use crate::error::{ChannelError, DriverError, Error, ErrorKind, Result, TransportError};

/// An interactive shell on one device.
pub(crate) struct Shell<C> {
    device: String,
    channel: PtyChannel<C>,
    prompt: Regex,
    read_timeout: Duration,
}

impl<C: ChannelIo> Shell<C> {
    pub(crate) fn new(params: &ConnectParams, channel: PtyChannel<C>) -> Self {
        Self {
            device: params.device.clone(),
            channel,
            prompt: params.prompt_pattern.clone(),
            read_timeout: params.ssh.read_timeout,
        }
    }

    /// Wait for the first prompt, then run the post-login commands.
    ///
    /// Any failure here means the session never became usable and is
    /// reported as a transport error.
    pub(crate) async fn login(&mut self, params: &ConnectParams) -> Result<()> {
        self.setup(params).await.map_err(|e| {
            if e.kind() == ErrorKind::Connect {
                e
            } else {
                TransportError::Setup {
                    host: params.ssh.host.clone(),
                    source: Box::new(e),
                }
                .into()
            }
        })
    }

    async fn setup(&mut self, params: &ConnectParams) -> Result<()> {
        let timeout = params.ssh.timeout;
        if let Err(e) = self.channel.read_until_pattern(&self.prompt, timeout).await {
            debug!("initial prompt from {}: {}", self.device, e);
            if !e.is_timeout() {
                return Err(e);
            }
            return Err(TransportError::NoInitialPrompt {
                host: params.ssh.host.clone(),
                timeout,
            }
            .into());
        }

        for command in &params.on_open_commands {
            self.channel.send(command).await?;
            if let Err(e) = self
                .channel
                .read_until_pattern(&self.prompt, self.read_timeout)
                .await
            {
                if !e.is_timeout() {
                    return Err(e);
                }
                warn!("{}: no prompt after '{}', continuing", self.device, command);
                self.channel.clear_buffer();
            }
        }
        Ok(())
    }

    fn remaining(deadline: Instant) -> Duration {
        deadline.saturating_duration_since(Instant::now())
    }

    /// Matches `line` echoed at the end of a terminal line.
    fn echo_pattern(line: &str) -> Result<Regex> {
        let pattern = format!(r"(?m){}[ \t]*\r?$", regex::escape(line.trim()));
        Ok(Regex::new(&pattern).map_err(ChannelError::from)?)
    }
}

impl<C: ChannelIo> Session for Shell<C> {
    async fn capture_prompt(&mut self) -> Result<String> {
        self.channel.send("").await?;
        let output = match self
            .channel
            .read_until_pattern(&self.prompt, self.read_timeout)
            .await
        {
            Ok(output) => output,
            Err(e) if e.is_timeout() => {
                return Err(DriverError::PromptDetection {
                    message: format!(
                        "no prompt from {} within {:?}",
                        self.device, self.read_timeout
                    ),
                }
                .into());
            }
            Err(e) => return Err(e),
        };

        last_line(&output).ok_or_else(|| {
            Error::from(DriverError::PromptDetection {
                message: format!("empty prompt from {}", self.device),
            })
        })
    }

    async fn send_line_expect(
        &mut self,
        text: &str,
        pattern: &Regex,
        timeout: Duration,
    ) -> Result<String> {
        self.channel.send(text).await?;
        let output = self.channel.read_until_pattern(pattern, timeout).await?;
        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    async fn send_line_timed(&mut self, text: &str, settle: Duration) -> Result<String> {
        self.channel.send(text).await?;
        let output = self
            .channel
            .read_until_quiet(settle, self.read_timeout)
            .await?;
        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    /// The block ends at the first prompt printed after the echo of its last
    /// line. Prompts the device prints between earlier lines do not end it.
    async fn send_block(&mut self, lines: &[String], timeout: Duration, verify: bool) -> Result<String> {
        let Some((last, init)) = lines.split_last() else {
            return Ok(String::new());
        };
        let deadline = Instant::now() + timeout;
        let mut output = Vec::new();

        for line in init {
            self.channel.send(line).await?;
            if verify && !line.trim().is_empty() {
                let echo = Self::echo_pattern(line)?;
                let chunk = self
                    .channel
                    .read_until_pattern(&echo, Self::remaining(deadline))
                    .await?;
                output.extend_from_slice(&chunk);
            }
        }

        self.channel.send(last).await?;
        let chunk = if last.trim().is_empty() {
            self.channel
                .read_until_pattern(&self.prompt, Self::remaining(deadline))
                .await?
        } else {
            let echo = Self::echo_pattern(last)?;
            self.channel
                .read_until_after(&echo, &self.prompt, Self::remaining(deadline))
                .await?
        };
        output.extend_from_slice(&chunk);

        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    async fn close(self) -> Result<()> {
        self.channel.close().await
    }
}
