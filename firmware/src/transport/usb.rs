//! Operator console over the ESP32-S3 USB serial/JTAG peripheral.
use alloc::boxed::Box;

use async_trait::async_trait;
use embassy_time::{Duration, Timer};
use esp_hal::Blocking;
use esp_hal::usb_serial_jtag::{UsbSerialJtagRx, UsbSerialJtagTx};
use nb::Error as NbError;

use super::{ConsoleInput, ConsoleSink, LinkError, on_console_line};
use crate::vault::Confirmation;

const POLL_INTERVAL: Duration = Duration::from_micros(250);

/// Console output half.
pub struct UsbConsole {
    tx: UsbSerialJtagTx<'static, Blocking>,
}

impl UsbConsole {
    pub fn new(tx: UsbSerialJtagTx<'static, Blocking>) -> Self {
        Self { tx }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        self.tx.write(bytes).map_err(|_| LinkError::Transport)
    }
}

#[async_trait(?Send)]
impl ConsoleSink for UsbConsole {
    async fn print(&mut self, text: &str) -> Result<(), LinkError> {
        self.write_all(text.as_bytes())?;
        self.write_all(b"\r\n")?;
        self.tx.flush_tx().map_err(|_| LinkError::Transport)
    }
}

/// Read operator lines forever and feed them to the state machine.
pub async fn read_console(
    mut rx: UsbSerialJtagRx<'static, Blocking>,
    confirmation: &'static Confirmation,
) -> ! {
    let mut input = ConsoleInput::new();
    loop {
        match rx.read_byte() {
            Ok(byte) => {
                if let Some(line) = input.push(byte) {
                    on_console_line(confirmation, &line);
                }
            }
            Err(NbError::WouldBlock) => Timer::after(POLL_INTERVAL).await,
            Err(NbError::Other(error)) => {
                log::warn!("console read failed: {error:?}");
                Timer::after(POLL_INTERVAL).await;
            }
        }
    }
}
