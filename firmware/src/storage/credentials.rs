use alloc::format;

use shared::credential::{CredentialKey, CredentialRecord, Secret};
use zeroize::Zeroizing;

use super::{PersistentStore, StorageError, StorageKey};

/// Maximum number of credentials the device keeps.
pub const CAPACITY: usize = 24;

type Records = heapless::Vec<CredentialRecord, CAPACITY>;

/// Outcome of a successful [`CredentialStore::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Inserted,
    Updated,
}

/// Bounded credential collection persisted as two items: the record sequence and the count
/// of live records.
///
/// `records` mirrors the persisted sequence, which may hold entries past `count` left behind
/// by [`CredentialStore::delete_all`] or by an interrupted insert. Only the first `count`
/// entries are live.
pub struct CredentialStore<P> {
    backend: P,
    records: Records,
    count: usize,
}

impl<P> CredentialStore<P>
where
    P: PersistentStore,
{
    /// Restore the store from `backend`. Missing items load as an empty store.
    pub async fn load(mut backend: P) -> Result<Self, StorageError<P::Error>> {
        let records: Records = match backend
            .read(StorageKey::Records)
            .await
            .map_err(StorageError::Backend)?
        {
            Some(bytes) => postcard::from_bytes(&bytes).map_err(|err| {
                StorageError::Decode(format!("failed to decode credential records: {err}"))
            })?,
            None => Records::new(),
        };

        let stored_count = match backend
            .read(StorageKey::RecordCount)
            .await
            .map_err(StorageError::Backend)?
        {
            Some(bytes) => postcard::from_bytes::<u32>(&bytes).map_err(|err| {
                StorageError::Decode(format!("failed to decode record count: {err}"))
            })? as usize,
            None => 0,
        };

        let count = if stored_count > records.len() {
            log::warn!(
                "record count {stored_count} exceeds {} persisted records, clamping",
                records.len()
            );
            records.len()
        } else {
            stored_count
        };

        log::info!("credential store loaded with {count} records");

        Ok(Self {
            backend,
            records,
            count,
        })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Live records in storage order.
    pub fn list(&self) -> &[CredentialRecord] {
        &self.records[..self.count]
    }

    pub fn lookup(&self, key: &CredentialKey) -> Option<&Secret> {
        self.list()
            .iter()
            .find(|record| record.matches(key))
            .map(|record| &record.secret)
    }

    pub fn contains(&self, key: &CredentialKey) -> bool {
        self.lookup(key).is_some()
    }

    /// Insert `record`, or replace the secret of the record sharing its key.
    ///
    /// The record sequence is written before the count. When the count write fails the new
    /// record is persisted but stays invisible, both now and after a reload.
    pub async fn upsert(
        &mut self,
        record: CredentialRecord,
    ) -> Result<Upserted, StorageError<P::Error>> {
        let key = record.key();
        let mut staged = self.records.clone();

        if let Some(index) = self.list().iter().position(|live| live.matches(&key)) {
            staged[index].secret = record.secret;
            self.persist_records(&staged).await?;
            self.records = staged;
            return Ok(Upserted::Updated);
        }

        if self.count >= CAPACITY {
            return Err(StorageError::Full);
        }

        if let Some(stale) = staged.get_mut(self.count) {
            *stale = record;
        } else if staged.push(record).is_err() {
            return Err(StorageError::Full);
        }

        self.persist_records(&staged).await?;
        self.records = staged;

        let count = self.count + 1;
        self.persist_count(count).await?;
        self.count = count;

        Ok(Upserted::Inserted)
    }

    /// Forget every record by writing a zero count.
    ///
    /// Record bytes stay in the medium and are only overwritten by later inserts; use
    /// [`CredentialStore::secure_erase`] to destroy them.
    pub async fn delete_all(&mut self) -> Result<(), StorageError<P::Error>> {
        self.persist_count(0).await?;
        self.count = 0;
        Ok(())
    }

    /// Erase the whole backend, then persist a zero count.
    pub async fn secure_erase(&mut self) -> Result<(), StorageError<P::Error>> {
        self.backend
            .erase_all()
            .await
            .map_err(StorageError::Backend)?;
        self.records.clear();
        self.count = 0;
        self.persist_count(0).await
    }

    pub fn backend(&self) -> &P {
        &self.backend
    }

    pub fn into_backend(self) -> P {
        self.backend
    }

    async fn persist_records(&mut self, records: &Records) -> Result<(), StorageError<P::Error>> {
        let encoded = postcard::to_allocvec(records)
            .map(Zeroizing::new)
            .map_err(|err| StorageError::Encode(format!("failed to encode records: {err}")))?;

        self.backend
            .write(StorageKey::Records, &encoded)
            .await
            .map_err(StorageError::Backend)
    }

    async fn persist_count(&mut self, count: usize) -> Result<(), StorageError<P::Error>> {
        let encoded = postcard::to_allocvec(&(count as u32))
            .map_err(|err| StorageError::Encode(format!("failed to encode count: {err}")))?;

        self.backend
            .write(StorageKey::RecordCount, &encoded)
            .await
            .map_err(StorageError::Backend)
    }
}
