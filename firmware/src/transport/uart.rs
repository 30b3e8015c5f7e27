//! Wireless link through a transparent serial radio bridge attached to a UART.
use alloc::boxed::Box;

use async_trait::async_trait;
use esp_hal::Async;
use esp_hal::uart::{UartRx, UartTx};

use super::{InboundLink, LinkError, ReplySink};
use crate::vault::Confirmation;

/// Largest chunk read from the bridge in one call.
pub const RADIO_CHUNK_SIZE: usize = 64;

pub struct RadioReplies {
    tx: UartTx<'static, Async>,
}

impl RadioReplies {
    pub fn new(tx: UartTx<'static, Async>) -> Self {
        Self { tx }
    }

    async fn write_all(&mut self, mut bytes: &[u8]) -> Result<(), LinkError> {
        while !bytes.is_empty() {
            let written = self
                .tx
                .write_async(bytes)
                .await
                .map_err(|_| LinkError::Transport)?;
            bytes = &bytes[written..];
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl ReplySink for RadioReplies {
    async fn send(&mut self, payload: &[u8]) -> Result<(), LinkError> {
        self.write_all(payload).await?;
        self.write_all(b"\n").await?;
        self.tx.flush_async().await.map_err(|_| LinkError::Transport)
    }
}

/// Read fragments from the bridge forever.
pub async fn read_radio(mut rx: UartRx<'static, Async>, confirmation: &'static Confirmation) -> ! {
    let mut link = InboundLink::new(confirmation);
    let mut chunk = [0u8; RADIO_CHUNK_SIZE];
    loop {
        match rx.read_async(&mut chunk).await {
            Ok(0) => {}
            Ok(len) => link.on_stream_chunk(&mut chunk[..len]),
            Err(error) => log::warn!("radio read failed: {error:?}"),
        }
    }
}
