//! Link adapters between the device's byte streams and the confirmation state machine.
use alloc::{boxed::Box, vec::Vec};
use core::fmt;

use async_trait::async_trait;
use shared::schema::{decode_command, encode_reply};
use zeroize::Zeroizing;

use crate::reassembly::Reassembler;
use crate::vault::{Confirmation, Outbound};

/// Longest operator line kept; longer input is truncated.
pub const CONSOLE_LINE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// Link could not deliver bytes.
    Transport,
    /// Reply could not be encoded.
    Encode,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::Transport => f.write_str("link transport failure"),
            LinkError::Encode => f.write_str("reply encoding failure"),
        }
    }
}

impl core::error::Error for LinkError {}

/// Outgoing half of the wireless link.
#[async_trait(?Send)]
pub trait ReplySink {
    /// Send one encoded reply to the client.
    async fn send(&mut self, payload: &[u8]) -> Result<(), LinkError>;
}

/// Outgoing half of the operator console.
#[async_trait(?Send)]
pub trait ConsoleSink {
    async fn print(&mut self, text: &str) -> Result<(), LinkError>;
}

/// Incoming half of the wireless link.
pub struct InboundLink<'a> {
    reassembler: Reassembler,
    confirmation: &'a Confirmation,
}

impl<'a> InboundLink<'a> {
    pub fn new(confirmation: &'a Confirmation) -> Self {
        Self {
            reassembler: Reassembler::new(),
            confirmation,
        }
    }

    /// Handle one fragment from the radio. The fragment is scrubbed before returning.
    pub fn on_receive(&mut self, fragment: &mut [u8]) {
        match self.reassembler.feed(fragment) {
            Ok(Some(payload)) => {
                let command = decode_command(&payload);
                if let Err(error) = &command {
                    log::warn!("request rejected: {error}");
                }
                self.confirmation.submit_command(command);
            }
            Ok(None) => {}
            Err(error) => log::warn!("dropping request: {error}"),
        }
    }

    /// Handle a chunk read from a byte stream, which may hold the tail of one request and
    /// the head of the next. Each line terminator closes a fragment.
    pub fn on_stream_chunk(&mut self, chunk: &mut [u8]) {
        for fragment in chunk.split_inclusive_mut(|&byte| byte == b'\n') {
            self.on_receive(fragment);
        }
    }
}

/// Accumulates console bytes into lines.
pub struct ConsoleInput {
    line: heapless::String<CONSOLE_LINE_CAPACITY>,
    overflowed: bool,
}

impl Default for ConsoleInput {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleInput {
    pub const fn new() -> Self {
        Self {
            line: heapless::String::new(),
            overflowed: false,
        }
    }

    /// Feed one byte; returns the finished line on `\r` or `\n`.
    pub fn push(&mut self, byte: u8) -> Option<heapless::String<CONSOLE_LINE_CAPACITY>> {
        match byte {
            b'\r' | b'\n' => {
                if self.overflowed {
                    log::warn!("console line exceeded {CONSOLE_LINE_CAPACITY} bytes");
                    self.overflowed = false;
                }
                Some(core::mem::take(&mut self.line))
            }
            byte if byte.is_ascii() => {
                if self.line.push(char::from(byte)).is_err() {
                    self.overflowed = true;
                }
                None
            }
            _ => None,
        }
    }
}

/// Forward one operator line to the state machine.
pub fn on_console_line(confirmation: &Confirmation, line: &str) {
    log::debug!("console input ({} bytes)", line.len());
    confirmation.submit_console_line(line);
}

/// Route one outbound message to its link.
pub async fn deliver<R, C>(
    message: Outbound,
    replies: &mut R,
    console: &mut C,
) -> Result<(), LinkError>
where
    R: ReplySink + ?Sized,
    C: ConsoleSink + ?Sized,
{
    match message {
        Outbound::Wireless(reply) => {
            let payload: Zeroizing<Vec<u8>> =
                encode_reply(&reply).map_err(|_| LinkError::Encode)?;
            replies.send(&payload).await
        }
        Outbound::Console(text) => console.print(&text).await,
    }
}

/// Deliver everything currently queued. Returns how many messages were handled.
pub async fn flush_outbox<R, C>(
    confirmation: &Confirmation,
    replies: &mut R,
    console: &mut C,
) -> usize
where
    R: ReplySink + ?Sized,
    C: ConsoleSink + ?Sized,
{
    let mut delivered = 0;
    while let Some(message) = confirmation.try_next_outbound() {
        if let Err(error) = deliver(message, replies, console).await {
            log::warn!("failed to deliver outbound message: {error}");
        }
        delivered += 1;
    }
    delivered
}

/// Drain the outbox forever.
pub async fn pump_outbox<R, C>(confirmation: &Confirmation, replies: &mut R, console: &mut C) -> !
where
    R: ReplySink + ?Sized,
    C: ConsoleSink + ?Sized,
{
    loop {
        let message = confirmation.next_outbound().await;
        if let Err(error) = deliver(message, replies, console).await {
            log::warn!("failed to deliver outbound message: {error}");
        }
    }
}

#[cfg(target_arch = "xtensa")]
pub mod uart;
#[cfg(target_arch = "xtensa")]
pub mod usb;
