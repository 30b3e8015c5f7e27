//! Wire vocabulary of the credential channel: decoded requests and encoded replies.
//!
//! Requests are compact JSON objects such as `{"site":"a.com","user":"bob"}`; a non-empty
//! `pwd` member turns a lookup into a store request. Replies are single-member objects,
//! either `{"err":"<status>"}` or `{"pwd":"<secret>"}`.
use alloc::{string::String, vec::Vec};

use serde::Serialize;
use serde_json::{Map, Value};
use zeroize::{Zeroize, Zeroizing};

use crate::credential::{CapacityExceeded, CredentialKey, CredentialRecord, Field, Secret};

const SITE_KEY: &str = "site";
const USER_KEY: &str = "user";
const SECRET_KEY: &str = "pwd";

/// Request decoded from a complete payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Retrieve the secret stored for the key, after operator approval.
    GetCredential(CredentialKey),
    /// Insert or update a record, after operator approval.
    StoreCredential(CredentialRecord),
}

/// Reasons a payload could not be turned into a [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// Not an object, or `site`/`user` missing or not strings.
    #[error("wrong message format")]
    WrongFormat,
    /// A field exceeds its fixed capacity.
    #[error("field `{field}` is {len} bytes long, limit is {max}")]
    FieldTooLong { field: Field, len: usize, max: usize },
}

impl From<CapacityExceeded> for CommandError {
    fn from(value: CapacityExceeded) -> Self {
        CommandError::FieldTooLong {
            field: value.field,
            len: value.len,
            max: value.field.max_len(),
        }
    }
}

fn check_len(field: Field, value: &str) -> Result<(), CommandError> {
    let max = field.max_len();
    if value.len() > max {
        return Err(CommandError::FieldTooLong {
            field,
            len: value.len(),
            max,
        });
    }
    Ok(())
}

fn string_member<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object.get(key).and_then(Value::as_str)
}

/// Decode a complete request payload.
///
/// Every length is validated before anything is copied into fixed-capacity fields; an
/// oversized value is reported, never truncated. A `pwd` member that is empty or not a
/// string is treated as absent.
pub fn decode_command(payload: &[u8]) -> Result<Command, CommandError> {
    let mut value: Value =
        serde_json::from_slice(payload).map_err(|_| CommandError::WrongFormat)?;
    let object = value.as_object_mut().ok_or(CommandError::WrongFormat)?;

    let command = command_from_object(object);

    if let Some(Value::String(secret)) = object.get_mut(SECRET_KEY) {
        secret.zeroize();
    }

    command
}

fn command_from_object(object: &Map<String, Value>) -> Result<Command, CommandError> {
    let site = string_member(object, SITE_KEY).ok_or(CommandError::WrongFormat)?;
    let username = string_member(object, USER_KEY).ok_or(CommandError::WrongFormat)?;
    let secret = string_member(object, SECRET_KEY).filter(|secret| !secret.is_empty());

    check_len(Field::Site, site)?;
    check_len(Field::Username, username)?;

    match secret {
        Some(secret) => {
            check_len(Field::Secret, secret)?;
            let key = CredentialKey::new(site, username)?;
            let secret = Secret::new(secret)?;
            Ok(Command::StoreCredential(CredentialRecord::from_key(key, secret)))
        }
        None => Ok(Command::GetCredential(CredentialKey::new(site, username)?)),
    }
}

/// Reply sent back over the wireless channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok,
    OperationRejected,
    WrongFormat,
    StorageFull,
    Busy,
    StorageFailure,
    Secret(Secret),
}

impl Reply {
    /// Status text carried in the `err` member, `None` for secret replies.
    pub fn status(&self) -> Option<&'static str> {
        match self {
            Reply::Ok => Some("ok"),
            Reply::OperationRejected => Some("operation rejected"),
            Reply::WrongFormat => Some("wrong msg format"),
            Reply::StorageFull => Some("storage is full"),
            Reply::Busy => Some("device busy"),
            Reply::StorageFailure => Some("storage failure"),
            Reply::Secret(_) => None,
        }
    }
}

impl From<CommandError> for Reply {
    fn from(_: CommandError) -> Self {
        Reply::WrongFormat
    }
}

#[derive(Serialize)]
struct StatusBody<'a> {
    err: &'a str,
}

#[derive(Serialize)]
struct SecretBody<'a> {
    pwd: &'a str,
}

/// Encode a reply into its compact JSON form.
pub fn encode_reply(reply: &Reply) -> Result<Zeroizing<Vec<u8>>, serde_json::Error> {
    let encoded = match reply {
        Reply::Secret(secret) => serde_json::to_vec(&SecretBody {
            pwd: secret.expose(),
        })?,
        other => serde_json::to_vec(&StatusBody {
            err: other.status().unwrap_or_default(),
        })?,
    };
    Ok(Zeroizing::new(encoded))
}
