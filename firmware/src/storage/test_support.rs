use alloc::{boxed::Box, collections::BTreeMap, vec::Vec};
use core::fmt;

use async_trait::async_trait;
use zeroize::Zeroizing;

use super::{PersistentStore, StorageKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectedFault(pub StorageKey);

impl fmt::Display for InjectedFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "injected write fault on {:?}", self.0)
    }
}

/// In-memory store whose writes can be made to fail, for exercising partial commits.
#[derive(Default)]
pub struct MemoryStore {
    items: BTreeMap<StorageKey, Vec<u8>>,
    failing: Option<StorageKey>,
    pub writes: Vec<StorageKey>,
    pub erase_count: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write to `key` fail until [`MemoryStore::heal`] is called.
    pub fn fail_writes_to(&mut self, key: StorageKey) {
        self.failing = Some(key);
    }

    pub fn heal(&mut self) {
        self.failing = None;
    }

    pub fn raw(&self, key: StorageKey) -> Option<&[u8]> {
        self.items.get(&key).map(Vec::as_slice)
    }

    pub fn insert_raw(&mut self, key: StorageKey, bytes: &[u8]) {
        self.items.insert(key, bytes.to_vec());
    }
}

#[async_trait(?Send)]
impl PersistentStore for MemoryStore {
    type Error = InjectedFault;

    async fn read(&mut self, key: StorageKey) -> Result<Option<Zeroizing<Vec<u8>>>, Self::Error> {
        Ok(self.items.get(&key).cloned().map(Zeroizing::new))
    }

    async fn write(&mut self, key: StorageKey, bytes: &[u8]) -> Result<(), Self::Error> {
        if self.failing == Some(key) {
            return Err(InjectedFault(key));
        }
        self.writes.push(key);
        self.items.insert(key, bytes.to_vec());
        Ok(())
    }

    async fn erase_all(&mut self) -> Result<(), Self::Error> {
        self.items.clear();
        self.erase_count += 1;
        Ok(())
    }
}
