//! Persistent storage for the credential store: the key/value seam and its flash backend.
use alloc::{boxed::Box, string::String, vec, vec::Vec};
use core::fmt;
use core::ops::Range;

use async_trait::async_trait;
use embedded_storage_async::nor_flash::NorFlash;
use sequential_storage::Error as FlashStorageError;
use sequential_storage::{cache::NoCache, map};
use zeroize::Zeroizing;

mod credentials;
pub mod partition;

pub use credentials::{CAPACITY, CredentialStore, Upserted};

/// Size of the scratch buffer used for (de)serializing flash items.
pub const STORAGE_SCRATCH_CAPACITY: usize = 4096;

#[derive(Debug)]
pub enum StorageError<E> {
    /// Every slot of the credential store is taken.
    Full,
    Backend(E),
    Decode(String),
    Encode(String),
}

impl<E> fmt::Display for StorageError<E>
where
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Full => f.write_str("credential storage is full"),
            StorageError::Backend(err) => write!(f, "storage backend error: {err:?}"),
            StorageError::Decode(err) => write!(f, "decode error: {err}"),
            StorageError::Encode(err) => write!(f, "encode error: {err}"),
        }
    }
}

impl<E> core::error::Error for StorageError<E> where E: fmt::Debug {}

/// Logical keys addressed in the persistent store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StorageKey {
    /// Number of live records, a `u32`.
    RecordCount,
    /// The record sequence blob.
    Records,
}

impl StorageKey {
    pub const fn id(self) -> u8 {
        match self {
            StorageKey::RecordCount => 0x01,
            StorageKey::Records => 0x02,
        }
    }
}

/// Durable key/value primitive underneath the credential store.
#[async_trait(?Send)]
pub trait PersistentStore {
    type Error: fmt::Debug;

    /// Read the value stored under `key`, `None` when it was never written.
    async fn read(&mut self, key: StorageKey) -> Result<Option<Zeroizing<Vec<u8>>>, Self::Error>;

    /// Durably replace the value stored under `key`.
    async fn write(&mut self, key: StorageKey, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Erase every value, including superseded copies still present in the medium.
    async fn erase_all(&mut self) -> Result<(), Self::Error>;
}

/// [`PersistentStore`] over a NOR flash range managed by `sequential-storage`.
pub struct FlashStore<S> {
    flash: S,
    range: Range<u32>,
    cache: NoCache,
    scratch: Zeroizing<Vec<u8>>,
}

impl<S> FlashStore<S>
where
    S: NorFlash,
{
    pub fn new(flash: S, range: Range<u32>) -> Self {
        Self {
            flash,
            range,
            cache: NoCache::new(),
            scratch: Zeroizing::new(vec![0u8; STORAGE_SCRATCH_CAPACITY]),
        }
    }

    pub fn range(&self) -> Range<u32> {
        self.range.clone()
    }

    pub fn into_inner(self) -> S {
        self.flash
    }
}

#[async_trait(?Send)]
impl<S> PersistentStore for FlashStore<S>
where
    S: NorFlash,
{
    type Error = FlashStorageError<S::Error>;

    async fn read(&mut self, key: StorageKey) -> Result<Option<Zeroizing<Vec<u8>>>, Self::Error> {
        let item = map::fetch_item::<u8, Vec<u8>, _>(
            &mut self.flash,
            self.range.clone(),
            &mut self.cache,
            self.scratch.as_mut_slice(),
            &key.id(),
        )
        .await?;

        Ok(item.map(Zeroizing::new))
    }

    async fn write(&mut self, key: StorageKey, bytes: &[u8]) -> Result<(), Self::Error> {
        map::store_item(
            &mut self.flash,
            self.range.clone(),
            &mut self.cache,
            self.scratch.as_mut_slice(),
            &key.id(),
            &bytes,
        )
        .await
    }

    async fn erase_all(&mut self) -> Result<(), Self::Error> {
        sequential_storage::erase_all(&mut self.flash, self.range.clone()).await?;
        self.cache = NoCache::new();
        Ok(())
    }
}

#[cfg(target_arch = "xtensa")]
mod boot;

#[cfg(target_arch = "xtensa")]
pub use boot::BootFlash;

#[cfg(test)]
pub(crate) mod test_support;
