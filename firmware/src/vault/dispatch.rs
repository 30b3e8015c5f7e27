use alloc::string::String;

use shared::schema::Reply;

use super::messages;
use super::{Confirmation, DeleteMode, Job, Outbound};
use crate::storage::{CredentialStore, PersistentStore, StorageError, Upserted};

/// Single consumer of approved actions and sole owner of the credential store.
pub struct Dispatcher<'a, P> {
    confirmation: &'a Confirmation,
    store: CredentialStore<P>,
}

impl<'a, P> Dispatcher<'a, P>
where
    P: PersistentStore,
{
    pub fn new(confirmation: &'a Confirmation, store: CredentialStore<P>) -> Self {
        Self {
            confirmation,
            store,
        }
    }

    pub fn store(&self) -> &CredentialStore<P> {
        &self.store
    }

    pub fn into_store(self) -> CredentialStore<P> {
        self.store
    }

    pub async fn run(&mut self) -> ! {
        loop {
            let job = self.confirmation.next_job().await;
            self.execute(job).await;
        }
    }

    /// Execute the queued job, if any. Returns `false` when nothing was queued.
    pub async fn dispatch_pending(&mut self) -> bool {
        match self.confirmation.try_next_job() {
            Some(job) => {
                self.execute(job).await;
                true
            }
            None => false,
        }
    }

    pub async fn execute(&mut self, job: Job) {
        match job {
            Job::Lookup(key) => {
                if self.store.contains(&key) {
                    self.confirmation.lookup_succeeded(key);
                } else {
                    log::info!("lookup miss for requested credential");
                    self.confirmation.finish();
                    self.console(messages::PASSWORD_MISSING);
                    self.reply(Reply::OperationRejected);
                }
            }
            Job::Retrieve(key) => {
                let secret = self.store.lookup(&key).cloned();
                self.confirmation.finish();
                match secret {
                    Some(secret) => {
                        self.reply(Reply::Secret(secret));
                        self.console(messages::PASSWORD_SENT);
                    }
                    None => {
                        log::warn!("approved credential vanished before retrieval");
                        self.reply(Reply::OperationRejected);
                    }
                }
            }
            Job::Store(record) => {
                let result = self.store.upsert(record).await;
                self.confirmation.finish();
                let (reply, notice) = match result {
                    Ok(Upserted::Inserted) => (Reply::Ok, messages::PASSWORD_STORED),
                    Ok(Upserted::Updated) => (Reply::Ok, messages::PASSWORD_UPDATED),
                    Err(StorageError::Full) => (Reply::StorageFull, messages::STORAGE_FULL),
                    Err(error) => {
                        log::error!("failed to store credential: {error}");
                        (Reply::StorageFailure, messages::STORAGE_FAILURE)
                    }
                };
                self.console(notice);
                self.reply(reply);
            }
            // Delete is operator-initiated, so only the console hears about it.
            Job::DeleteAll(mode) => {
                let result = match mode {
                    DeleteMode::Lazy => self.store.delete_all().await,
                    DeleteMode::Secure => self.store.secure_erase().await,
                };
                self.confirmation.finish();
                let notice = match (result, mode) {
                    (Ok(()), DeleteMode::Lazy) => messages::ALL_DELETED,
                    (Ok(()), DeleteMode::Secure) => messages::ALL_ERASED,
                    (Err(error), _) => {
                        log::error!("failed to delete credentials: {error}");
                        messages::DELETE_FAILED
                    }
                };
                self.console(notice);
            }
            Job::List => {
                self.confirmation.finish();
                let listing = messages::listing(self.store.list());
                self.console(listing);
            }
            Job::RejectRequest(error) => {
                log::warn!("rejecting malformed request: {error}");
                self.confirmation.finish();
                self.reply(Reply::from(error));
            }
        }
    }

    fn reply(&self, reply: Reply) {
        self.confirmation.post(Outbound::Wireless(reply));
    }

    fn console(&self, text: impl Into<String>) {
        self.confirmation.post(Outbound::Console(text.into()));
    }
}
