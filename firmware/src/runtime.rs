//! Xtensa entry point: heap, peripherals, credential store and the cooperating tasks.
use embassy_executor::{SpawnError, Spawner};
use esp_hal::{
    Async, Blocking, Config,
    clock::CpuClock,
    timer::timg::TimerGroup,
    uart::{Config as UartConfig, Uart, UartRx},
    usb_serial_jtag::{UsbSerialJtag, UsbSerialJtagRx},
};
use esp_hal_embassy::Executor;
use esp_storage::FlashStorage;
use static_cell::StaticCell;

use crate::storage::{BootFlash, CredentialStore, FlashStore};
use crate::system;
use crate::transport::{
    pump_outbox,
    uart::{RadioReplies, read_radio},
    usb::{UsbConsole, read_console},
};
use crate::vault::Dispatcher;

const HEAP_SIZE: usize = 64 * 1024;

static EXECUTOR: StaticCell<Executor> = StaticCell::new();

type DeviceStore = CredentialStore<FlashStore<BootFlash<'static>>>;

fn spawn_or_log(name: &str, result: Result<(), SpawnError>) {
    if let Err(error) = result {
        log::error!("Failed to spawn {name}: {error:?}");
    }
}

/// Stop the device. Running without reliable storage is not an option.
fn halt(reason: &str) -> ! {
    log::error!("halting: {reason}");
    loop {
        core::hint::spin_loop();
    }
}

/// Link halves handed to the vault task once the store is ready.
struct Links {
    console_rx: UsbSerialJtagRx<'static, Blocking>,
    console: UsbConsole,
    radio_rx: UartRx<'static, Async>,
    radio: RadioReplies,
}

pub fn main() -> ! {
    esp_alloc::heap_allocator!(size: HEAP_SIZE);
    esp_println::logger::init_logger(log::LevelFilter::Info);

    let peripherals = esp_hal::init(Config::default().with_cpu_clock(CpuClock::max()));
    let mut timg0 = TimerGroup::new(peripherals.TIMG0);
    timg0.wdt.disable();
    esp_hal_embassy::init(timg0.timer0);

    let flash = BootFlash::new(FlashStorage::new(peripherals.FLASH));

    let (console_rx, console_tx) = UsbSerialJtag::new(peripherals.USB_DEVICE).split();

    let radio = match Uart::new(peripherals.UART1, UartConfig::default()) {
        Ok(uart) => uart
            .with_rx(peripherals.GPIO1)
            .with_tx(peripherals.GPIO2)
            .into_async(),
        Err(error) => halt(&alloc::format!("radio UART configuration failed: {error:?}")),
    };
    let (radio_rx, radio_tx) = radio.split();

    let links = Links {
        console_rx,
        console: UsbConsole::new(console_tx),
        radio_rx,
        radio: RadioReplies::new(radio_tx),
    };

    let executor = EXECUTOR.init(Executor::new());
    executor.run(move |spawner| {
        spawn_or_log("vault task", spawner.spawn(tasks::vault(spawner, flash, links)));
    })
}

async fn load_store(mut flash: BootFlash<'static>) -> DeviceStore {
    let Some(range) = flash.credential_partition().await else {
        halt("credential partition not found");
    };
    log::info!(
        "credential partition at {:#x}..{:#x}",
        range.start,
        range.end
    );

    match CredentialStore::load(FlashStore::new(flash, range)).await {
        Ok(store) => {
            log::info!("loaded {} stored credentials", store.len());
            store
        }
        Err(error) => halt(&alloc::format!("credential store failed to load: {error}")),
    }
}

mod tasks {
    use super::*;

    #[embassy_executor::task]
    pub async fn vault(spawner: Spawner, flash: BootFlash<'static>, links: Links) {
        let store = load_store(flash).await;
        let confirmation = system::confirmation();

        let Links {
            console_rx,
            console,
            radio_rx,
            radio,
        } = links;
        spawn_or_log("console task", spawner.spawn(console_reader(console_rx)));
        spawn_or_log("radio task", spawner.spawn(radio_reader(radio_rx)));
        spawn_or_log("outbox task", spawner.spawn(outbox(radio, console)));

        Dispatcher::new(confirmation, store).run().await
    }

    #[embassy_executor::task]
    pub async fn console_reader(rx: UsbSerialJtagRx<'static, Blocking>) {
        read_console(rx, system::confirmation()).await
    }

    #[embassy_executor::task]
    pub async fn radio_reader(rx: UartRx<'static, Async>) {
        read_radio(rx, system::confirmation()).await
    }

    #[embassy_executor::task]
    pub async fn outbox(mut radio: RadioReplies, mut console: UsbConsole) {
        pump_outbox(system::confirmation(), &mut radio, &mut console).await
    }
}
