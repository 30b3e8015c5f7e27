use alloc::{string::String, vec::Vec};
use core::cell::RefCell;
use core::mem;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::{Channel, TrySendError};
use embassy_sync::signal::Signal;
use heapless::Deque;
use shared::credential::CredentialKey;
use shared::schema::{Command, CommandError, Reply};

use super::messages;
use super::{
    DeleteMode, JOB_QUEUE_DEPTH, Job, OUTBOX_DEPTH, Outbound, PendingRequest, State, VaultMutex,
};

struct Slot {
    state: State,
    pending: PendingRequest,
    outbox: Outbox,
}

/// Outbound messages waiting for the link pump.
///
/// A request is only accepted while the queue has room for one more wireless reply, and
/// each accepted request produces at most one. Console lines give way to wireless replies
/// when the queue is full, so a reply owed to the client is never dropped.
struct Outbox {
    queue: Deque<Outbound, OUTBOX_DEPTH>,
    /// `Busy` replies owed to refused requests. They never take a queue slot.
    busy_owed: u32,
}

impl Outbox {
    const fn new() -> Self {
        Self {
            queue: Deque::new(),
            busy_owed: 0,
        }
    }

    fn wireless_queued(&self) -> usize {
        self.queue
            .iter()
            .filter(|message| matches!(message, Outbound::Wireless(_)))
            .count()
    }

    fn has_room_for_reply(&self) -> bool {
        self.wireless_queued() < OUTBOX_DEPTH
    }

    fn push(&mut self, message: Outbound) {
        if message == Outbound::Wireless(Reply::Busy) {
            self.busy_owed = self.busy_owed.saturating_add(1);
            return;
        }

        if self.queue.is_full() {
            let wireless = matches!(message, Outbound::Wireless(_));
            if !wireless || !self.evict_console_line() {
                log::warn!("outbox full, dropping {}", describe(&message));
                return;
            }
        }

        if let Err(dropped) = self.queue.push_back(message) {
            log::warn!("outbox full, dropping {}", describe(&dropped));
        }
    }

    /// Drop the oldest queued console line. Returns `false` when there is none.
    fn evict_console_line(&mut self) -> bool {
        if !self
            .queue
            .iter()
            .any(|message| matches!(message, Outbound::Console(_)))
        {
            return false;
        }

        let mut kept = Deque::new();
        let mut evicted = false;
        while let Some(message) = self.queue.pop_front() {
            if !evicted && matches!(message, Outbound::Console(_)) {
                evicted = true;
                continue;
            }
            let _ = kept.push_back(message);
        }
        self.queue = kept;
        log::warn!("outbox full, dropped a console line to make room for a reply");
        true
    }

    fn pop(&mut self) -> Option<Outbound> {
        if let Some(message) = self.queue.pop_front() {
            return Some(message);
        }
        if self.busy_owed > 0 {
            self.busy_owed -= 1;
            return Some(Outbound::Wireless(Reply::Busy));
        }
        None
    }
}

/// Side effects decided under the lock and carried out after it is released.
#[derive(Default)]
struct Effects {
    outbound: Vec<Outbound>,
    job: Option<Job>,
}

impl Effects {
    fn reply(mut self, reply: Reply) -> Self {
        self.outbound.push(Outbound::Wireless(reply));
        self
    }

    fn console(mut self, text: impl Into<String>) -> Self {
        self.outbound.push(Outbound::Console(text.into()));
        self
    }

    fn schedule(mut self, job: Job) -> Self {
        self.job = Some(job);
        self
    }
}

/// Gate between the two producers (radio and console) and the dispatcher.
///
/// State, the pending slot and the outbox only change under `slot`'s lock. Jobs are queued
/// and the link pump is woken after the lock is released.
pub struct Confirmation {
    slot: Mutex<VaultMutex, RefCell<Slot>>,
    jobs: Channel<VaultMutex, Job, JOB_QUEUE_DEPTH>,
    outbound_ready: Signal<VaultMutex, ()>,
}

impl Default for Confirmation {
    fn default() -> Self {
        Self::new()
    }
}

impl Confirmation {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(RefCell::new(Slot {
                state: State::Idle,
                pending: PendingRequest::None,
                outbox: Outbox::new(),
            })),
            jobs: Channel::new(),
            outbound_ready: Signal::new(),
        }
    }

    pub fn state(&self) -> State {
        self.slot.lock(|slot| slot.borrow().state)
    }

    /// Inspect the pending request.
    pub fn with_pending<R>(&self, f: impl FnOnce(&PendingRequest) -> R) -> R {
        self.slot.lock(|slot| f(&slot.borrow().pending))
    }

    /// Accept a decoded (or rejected) request from the wireless client.
    pub fn submit_command(&self, command: Result<Command, CommandError>) {
        let effects = self.slot.lock(|slot| {
            let mut slot = slot.borrow_mut();
            if slot.state != State::Idle {
                log::warn!("request refused while {:?}", slot.state);
                return Effects::default().reply(Reply::Busy);
            }
            if !slot.outbox.has_room_for_reply() {
                log::warn!("request refused, undelivered replies fill the outbox");
                return Effects::default().reply(Reply::Busy);
            }

            match command {
                Ok(Command::GetCredential(key)) => {
                    slot.state = State::LookupPending;
                    Effects::default().schedule(Job::Lookup(key))
                }
                Ok(Command::StoreCredential(record)) => {
                    let prompt = messages::store_prompt(&record);
                    slot.state = State::AwaitStoreConfirm;
                    slot.pending = PendingRequest::AwaitStore(record);
                    Effects::default().console(prompt)
                }
                Err(error) => {
                    let notice = match error {
                        CommandError::WrongFormat => messages::WRONG_FORMAT,
                        CommandError::FieldTooLong { .. } => messages::FIELD_TOO_LONG,
                    };
                    slot.state = State::RequestError;
                    Effects::default()
                        .console(notice)
                        .schedule(Job::RejectRequest(error))
                }
            }
        });

        self.apply(effects);
    }

    /// Accept one line typed by the operator.
    pub fn submit_console_line(&self, line: &str) {
        let effects = self.slot.lock(|slot| {
            let mut slot = slot.borrow_mut();
            match slot.state {
                State::Idle => idle_command(&mut slot, line.trim()),
                State::AwaitGetConfirm
                | State::AwaitStoreConfirm
                | State::AwaitDeleteConfirm(_) => resolve(&mut slot, is_approval(line)),
                _ => Effects::default().console(messages::DEVICE_BUSY),
            }
        });

        self.apply(effects);
    }

    /// Record a successful lookup and ask the operator to approve sending the secret.
    pub fn lookup_succeeded(&self, key: CredentialKey) {
        let effects = self.slot.lock(|slot| {
            let mut slot = slot.borrow_mut();
            if slot.state != State::LookupPending {
                log::error!("lookup completed while {:?}", slot.state);
                return Effects::default();
            }

            let prompt = messages::get_prompt(&key);
            slot.state = State::AwaitGetConfirm;
            slot.pending = PendingRequest::AwaitGet(key);
            Effects::default().console(prompt)
        });

        self.apply(effects);
    }

    /// Return to `Idle` once the dispatcher has completed an action.
    pub fn finish(&self) {
        self.slot.lock(|slot| {
            let mut slot = slot.borrow_mut();
            slot.state = State::Idle;
            slot.pending = PendingRequest::None;
        });
    }

    pub fn try_next_job(&self) -> Option<Job> {
        self.jobs.try_receive().ok()
    }

    pub async fn next_job(&self) -> Job {
        self.jobs.receive().await
    }

    pub fn try_next_outbound(&self) -> Option<Outbound> {
        self.slot.lock(|slot| slot.borrow_mut().outbox.pop())
    }

    /// Wait for the next message for one of the links.
    pub async fn next_outbound(&self) -> Outbound {
        loop {
            if let Some(message) = self.try_next_outbound() {
                return message;
            }
            self.outbound_ready.wait().await;
        }
    }

    pub(super) fn post(&self, message: Outbound) {
        self.post_all([message]);
    }

    fn post_all(&self, messages: impl IntoIterator<Item = Outbound>) {
        let mut posted = false;
        self.slot.lock(|slot| {
            let mut slot = slot.borrow_mut();
            for message in messages {
                slot.outbox.push(message);
                posted = true;
            }
        });
        if posted {
            self.outbound_ready.signal(());
        }
    }

    fn apply(&self, effects: Effects) {
        self.post_all(effects.outbound);

        if let Some(job) = effects.job
            && let Err(TrySendError::Full(job)) = self.jobs.try_send(job)
        {
            log::error!("dispatcher still busy, abandoning {job:?}");
            self.finish();
        }
    }
}

fn idle_command(slot: &mut Slot, command: &str) -> Effects {
    match command {
        "" => Effects::default(),
        "list" => {
            slot.state = State::ShowList;
            slot.pending = PendingRequest::AwaitList;
            Effects::default().schedule(Job::List)
        }
        "clear storage" => await_delete(slot, DeleteMode::Lazy),
        "secure erase" => await_delete(slot, DeleteMode::Secure),
        _ => Effects::default().console(messages::CONSOLE_HELP),
    }
}

fn await_delete(slot: &mut Slot, mode: DeleteMode) -> Effects {
    slot.state = State::AwaitDeleteConfirm(mode);
    slot.pending = PendingRequest::AwaitDeleteAll(mode);
    Effects::default().console(messages::delete_prompt(mode))
}

fn resolve(slot: &mut Slot, approved: bool) -> Effects {
    match (mem::take(&mut slot.pending), approved) {
        (PendingRequest::AwaitGet(key), true) => {
            slot.state = State::GetConfirmed;
            Effects::default().schedule(Job::Retrieve(key))
        }
        (PendingRequest::AwaitStore(record), true) => {
            slot.state = State::StoreConfirmed;
            Effects::default().schedule(Job::Store(record))
        }
        (PendingRequest::AwaitDeleteAll(mode), true) => {
            slot.state = State::DeleteConfirmed(mode);
            Effects::default().schedule(Job::DeleteAll(mode))
        }
        (PendingRequest::AwaitGet(_), false) => {
            slot.state = State::Idle;
            Effects::default()
                .console(messages::REQUEST_REJECTED)
                .reply(Reply::OperationRejected)
        }
        (PendingRequest::AwaitStore(_), false) => {
            slot.state = State::Idle;
            Effects::default()
                .console(messages::STORE_CANCELLED)
                .reply(Reply::OperationRejected)
        }
        (PendingRequest::AwaitDeleteAll(_), false) => {
            slot.state = State::Idle;
            Effects::default().console(messages::CLEAR_CANCELLED)
        }
        (other, _) => {
            log::error!("{:?} has no matching pending request", slot.state);
            slot.pending = other;
            Effects::default().console(messages::DEVICE_BUSY)
        }
    }
}

/// Only the first character counts: `Y`/`y` approves, anything else rejects.
fn is_approval(line: &str) -> bool {
    matches!(line.as_bytes().first(), Some(b'Y' | b'y'))
}

fn describe(message: &Outbound) -> &'static str {
    match message {
        Outbound::Wireless(_) => "wireless reply",
        Outbound::Console(_) => "console line",
    }
}
