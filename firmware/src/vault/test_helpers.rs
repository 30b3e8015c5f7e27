use alloc::{string::String, vec::Vec};

use shared::credential::{CredentialKey, CredentialRecord};
use shared::schema::{Command, CommandError, Reply};

use super::{Confirmation, Outbound};

pub(crate) fn get_command(site: &str, username: &str) -> Result<Command, CommandError> {
    Ok(Command::GetCredential(key(site, username)))
}

pub(crate) fn store_command(
    site: &str,
    username: &str,
    secret: &str,
) -> Result<Command, CommandError> {
    Ok(Command::StoreCredential(record(site, username, secret)))
}

pub(crate) fn key(site: &str, username: &str) -> CredentialKey {
    CredentialKey::new(site, username).expect("key within bounds")
}

pub(crate) fn record(site: &str, username: &str, secret: &str) -> CredentialRecord {
    CredentialRecord::new(site, username, secret).expect("record within bounds")
}

pub(crate) fn drain(confirmation: &Confirmation) -> Vec<Outbound> {
    let mut collected = Vec::new();
    while let Some(message) = confirmation.try_next_outbound() {
        collected.push(message);
    }
    collected
}

pub(crate) fn replies(messages: &[Outbound]) -> Vec<Reply> {
    messages
        .iter()
        .filter_map(|message| match message {
            Outbound::Wireless(reply) => Some(reply.clone()),
            Outbound::Console(_) => None,
        })
        .collect()
}

pub(crate) fn console_text(messages: &[Outbound]) -> String {
    let mut text = String::new();
    for message in messages {
        if let Outbound::Console(line) = message {
            text.push_str(line);
            text.push('\n');
        }
    }
    text
}
