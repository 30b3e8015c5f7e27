//! Request confirmation state machine and the dispatcher that executes approved actions.
use alloc::string::String;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use shared::credential::{CredentialKey, CredentialRecord};
use shared::schema::{CommandError, Reply};

mod confirm;
mod dispatch;
mod messages;

pub use confirm::Confirmation;
pub use dispatch::Dispatcher;

pub type VaultMutex = CriticalSectionRawMutex;

/// Depth of the handoff channel to the dispatcher; one action is in flight at a time.
pub const JOB_QUEUE_DEPTH: usize = 1;
/// Depth of the outbound queue drained by the link pump. `Busy` replies are counted apart.
pub const OUTBOX_DEPTH: usize = 8;

/// How an approved delete treats the record bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    /// Reset the record count; record bytes remain in flash.
    Lazy,
    /// Erase the storage partition before resetting the count.
    Secure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    /// A get request waits for the dispatcher to look the key up.
    LookupPending,
    AwaitGetConfirm,
    GetConfirmed,
    AwaitStoreConfirm,
    StoreConfirmed,
    AwaitDeleteConfirm(DeleteMode),
    DeleteConfirmed(DeleteMode),
    ShowList,
    /// A malformed request is queued for its error reply.
    RequestError,
}

/// The single in-flight request.
#[derive(Debug, Default, PartialEq, Eq)]
pub enum PendingRequest {
    #[default]
    None,
    AwaitGet(CredentialKey),
    AwaitStore(CredentialRecord),
    AwaitDeleteAll(DeleteMode),
    AwaitList,
}

/// Action handed from the state machine to the dispatcher.
#[derive(Debug, PartialEq, Eq)]
pub enum Job {
    Lookup(CredentialKey),
    Retrieve(CredentialKey),
    Store(CredentialRecord),
    DeleteAll(DeleteMode),
    List,
    RejectRequest(CommandError),
}

/// Message queued for one of the links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Reply for the wireless client.
    Wireless(Reply),
    /// Text for the local operator console.
    Console(String),
}

#[cfg(test)]
pub(crate) mod test_helpers;
