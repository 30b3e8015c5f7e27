use core::ops::Range;

use embassy_embedded_hal::adapter::BlockingAsync;
use embedded_storage::nor_flash::NorFlash as BlockingNorFlash;
use embedded_storage_async::nor_flash::{ErrorType, NorFlash, ReadNorFlash};
use esp_storage::{FlashStorage, FlashStorageError};

use super::partition::{self, PARTITION_TABLE_OFFSET, PARTITION_TABLE_SIZE};

/// Internal flash exposed through the async NOR flash traits.
pub struct BootFlash<'d> {
    storage: BlockingAsync<FlashStorage<'d>>,
}

impl<'d> BootFlash<'d> {
    pub fn new(storage: FlashStorage<'d>) -> Self {
        Self {
            storage: BlockingAsync::new(storage),
        }
    }

    /// Read the partition table and locate the credential partition.
    pub async fn credential_partition(&mut self) -> Option<Range<u32>> {
        let mut table = [0u8; PARTITION_TABLE_SIZE];
        if let Err(error) =
            ReadNorFlash::read(&mut self.storage, PARTITION_TABLE_OFFSET, &mut table).await
        {
            log::error!("failed to read partition table: {error:?}");
            return None;
        }

        partition::credential_partition(&table)
    }
}

impl ErrorType for BootFlash<'_> {
    type Error = FlashStorageError;
}

impl ReadNorFlash for BootFlash<'_> {
    const READ_SIZE: usize = FlashStorage::READ_SIZE as usize;

    fn capacity(&self) -> usize {
        ReadNorFlash::capacity(&self.storage)
    }

    async fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.storage.read(offset, bytes).await
    }
}

impl NorFlash for BootFlash<'_> {
    const WRITE_SIZE: usize = <FlashStorage as BlockingNorFlash>::WRITE_SIZE as usize;
    const ERASE_SIZE: usize = <FlashStorage as BlockingNorFlash>::ERASE_SIZE as usize;

    async fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        self.storage.erase(from, to).await
    }

    async fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        self.storage.write(offset, bytes).await
    }
}
