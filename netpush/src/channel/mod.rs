//! Channel layer: the interactive PTY and its output buffer.
//!
//! Handles reading device output until a prompt pattern appears or the
//! line goes quiet, with ANSI escape sequences stripped on the way in.

mod buffer;
mod pty;

pub use buffer::{PatternBuffer, last_line};
pub use pty::{ChannelIo, PtyChannel, PtyConfig};
