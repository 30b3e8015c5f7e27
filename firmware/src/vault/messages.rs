use alloc::{format, string::String};
use core::fmt::Write;

use shared::credential::{CredentialKey, CredentialRecord};

use super::DeleteMode;

pub(super) const CONSOLE_HELP: &str = "Available commands:\n\
    \tlist           - show stored sites and usernames\n\
    \tclear storage  - forget all stored passwords\n\
    \tsecure erase   - erase the whole password partition";
pub(super) const DEVICE_BUSY: &str = "Device busy, finish the current request first";
pub(super) const REQUEST_REJECTED: &str = "Password request rejected";
pub(super) const STORE_CANCELLED: &str = "Password storage cancelled";
pub(super) const CLEAR_CANCELLED: &str = "Storage clear cancelled";
pub(super) const PASSWORD_SENT: &str = "Password sent to client";
pub(super) const PASSWORD_MISSING: &str = "Password is not stored";
pub(super) const PASSWORD_STORED: &str = "Password stored";
pub(super) const PASSWORD_UPDATED: &str = "Password updated";
pub(super) const STORAGE_FULL: &str = "Storage is full. No new password can be stored";
pub(super) const STORAGE_FAILURE: &str = "Password could not be written to storage";
pub(super) const ALL_DELETED: &str = "All stored passwords have been deleted";
pub(super) const ALL_ERASED: &str = "Password storage has been erased";
pub(super) const DELETE_FAILED: &str = "Deleting stored passwords failed";
pub(super) const WRONG_FORMAT: &str = "Wrong message format";
pub(super) const FIELD_TOO_LONG: &str =
    "Message error. Make sure the fields do not exceed the maximum allowed length";
pub(super) const NOTHING_STORED: &str = "No password stored";

pub(super) fn get_prompt(key: &CredentialKey) -> String {
    format!(
        "New message:\n\t- Site: {}\n\t- Username: {}\nThere is a password stored for user '{}'.\nTo confirm/reject, type Y/n",
        key.site, key.username, key.username
    )
}

pub(super) fn store_prompt(record: &CredentialRecord) -> String {
    format!(
        "New message:\n\t- Site: {}\n\t- Username: {}\n\t- Password: ********\nDo you want to store the password for user \"{}\"?\nTo confirm/reject, type Y/n",
        record.site, record.username, record.username
    )
}

pub(super) fn delete_prompt(mode: DeleteMode) -> &'static str {
    match mode {
        DeleteMode::Lazy => "Are you sure you want to delete ALL passwords?\nTo confirm/reject, type Y/n",
        DeleteMode::Secure => {
            "Are you sure you want to ERASE the password storage?\nTo confirm/reject, type Y/n"
        }
    }
}

pub(super) fn listing(records: &[CredentialRecord]) -> String {
    if records.is_empty() {
        return String::from(NOTHING_STORED);
    }

    let mut text = format!("List of stored passwords ({}):", records.len());
    for (index, record) in records.iter().enumerate() {
        let _ = write!(
            text,
            "\n\t{index}. Site: {}, username: {}",
            record.site, record.username
        );
    }
    text
}
