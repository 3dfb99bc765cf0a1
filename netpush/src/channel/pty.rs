//! PTY channel abstraction for interactive sessions.

use std::future::Future;
use std::time::Duration;

use log::trace;
use regex::bytes::Regex;
use russh::client::Msg;
use russh::{Channel, ChannelMsg};
use tokio::time::Instant;

use super::buffer::PatternBuffer;
use crate::error::{ChannelError, Result};

/// Raw byte I/O under a [`PtyChannel`].
///
/// Implemented for russh's client channel. `read` must be cancel safe: a
/// read dropped at a deadline must not lose data.
pub trait ChannelIo: Send {
    /// Write bytes to the remote shell.
    fn write(&mut self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Wait for the next chunk of output. `None` once the channel is closed.
    fn read(&mut self) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Close the channel.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

impl ChannelIo for Channel<Msg> {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.data(data).await.map_err(ChannelError::Ssh)?;
        Ok(())
    }

    async fn read(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            match self.wait().await {
                Some(ChannelMsg::Data { data }) | Some(ChannelMsg::ExtendedData { data, .. }) => {
                    return Ok(Some(data.to_vec()));
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => return Ok(None),
                Some(_) => continue,
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        Channel::close(self).await.map_err(ChannelError::Ssh)?;
        Ok(())
    }
}

/// Configuration for PTY channel behavior.
#[derive(Debug, Clone)]
pub struct PtyConfig {
    /// Search depth for pattern matching.
    pub search_depth: usize,

    /// Line terminator appended to every sent line.
    pub return_char: String,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            search_depth: 1000,
            return_char: "\n".to_string(),
        }
    }
}

/// Interactive shell channel with pattern-based and quiet-period reads.
pub struct PtyChannel<C = Channel<Msg>> {
    channel: C,
    config: PtyConfig,
    buffer: PatternBuffer,
}

impl<C: ChannelIo> PtyChannel<C> {
    /// Wrap a channel that already has a PTY and shell.
    pub fn new(channel: C, config: PtyConfig) -> Self {
        Self {
            buffer: PatternBuffer::new(config.search_depth),
            channel,
            config,
        }
    }

    /// Write one line followed by the return character.
    pub async fn send(&mut self, line: &str) -> Result<()> {
        trace!("send: {:?}", line);
        let mut payload = Vec::with_capacity(line.len() + self.config.return_char.len());
        payload.extend_from_slice(line.as_bytes());
        payload.extend_from_slice(self.config.return_char.as_bytes());
        self.channel.write(&payload).await
    }

    /// Read until `pattern` appears in the buffer tail or `timeout` elapses.
    ///
    /// Returns everything read, including the match.
    pub async fn read_until_pattern(&mut self, pattern: &Regex, timeout: Duration) -> Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.buffer.tail_contains(pattern) {
                return Ok(self.buffer.take());
            }
            if !self.read_chunk(deadline).await? {
                return Err(ChannelError::PatternTimeout(timeout).into());
            }
        }
    }

    /// Read until `pattern` matches somewhere after `marker`, or `timeout`
    /// elapses.
    pub async fn read_until_after(
        &mut self,
        marker: &Regex,
        pattern: &Regex,
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.buffer.contains_after(marker, pattern) {
                return Ok(self.buffer.take());
            }
            if !self.read_chunk(deadline).await? {
                return Err(ChannelError::PatternTimeout(timeout).into());
            }
        }
    }

    /// Read until the channel has been quiet for `settle`, or `ceiling`
    /// elapses, whichever comes first. Never fails on timing.
    pub async fn read_until_quiet(&mut self, settle: Duration, ceiling: Duration) -> Result<Vec<u8>> {
        let hard_deadline = Instant::now() + ceiling;
        loop {
            let quiet_deadline = (Instant::now() + settle).min(hard_deadline);
            if !self.read_chunk(quiet_deadline).await? || Instant::now() >= hard_deadline {
                return Ok(self.buffer.take());
            }
        }
    }

    /// Discard buffered output.
    pub fn clear_buffer(&mut self) {
        self.buffer.clear();
    }

    /// Close the channel.
    pub async fn close(mut self) -> Result<()> {
        self.channel.close().await
    }

    /// Wait for one chunk. Returns `false` if the deadline passed.
    async fn read_chunk(&mut self, deadline: Instant) -> Result<bool> {
        match tokio::time::timeout_at(deadline, self.channel.read()).await {
            Ok(Ok(Some(data))) => {
                trace!("recv: {} bytes", data.len());
                self.buffer.extend(&data);
                Ok(true)
            }
            Ok(Ok(None)) => Err(ChannelError::Closed.into()),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(false),
        }
    }
}
