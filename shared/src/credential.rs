//! Credential records exchanged with clients and persisted by the device.
use core::{fmt, str};

use heapless::String;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::{Zeroize, Zeroizing};

/// Maximum length (in bytes) of a site identifier.
pub const SITE_MAX_LEN: usize = 48;
/// Maximum length (in bytes) of a username.
pub const USERNAME_MAX_LEN: usize = 24;
/// Maximum length (in bytes) of a stored secret.
pub const SECRET_MAX_LEN: usize = 24;

pub type Site = String<SITE_MAX_LEN>;
pub type Username = String<USERNAME_MAX_LEN>;

/// Request field that can be rejected for exceeding its fixed capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Site,
    Username,
    Secret,
}

impl Field {
    pub const fn max_len(self) -> usize {
        match self {
            Field::Site => SITE_MAX_LEN,
            Field::Username => USERNAME_MAX_LEN,
            Field::Secret => SECRET_MAX_LEN,
        }
    }

    pub const fn wire_name(self) -> &'static str {
        match self {
            Field::Site => "site",
            Field::Username => "user",
            Field::Secret => "pwd",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Value did not fit the fixed-capacity field it was copied into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityExceeded {
    pub field: Field,
    pub len: usize,
}

impl fmt::Display for CapacityExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} is {} bytes long, limit is {}",
            self.field,
            self.len,
            self.field.max_len()
        )
    }
}

fn bounded<const N: usize>(field: Field, value: &str) -> Result<String<N>, CapacityExceeded> {
    String::try_from(value).map_err(|_| CapacityExceeded {
        field,
        len: value.len(),
    })
}

/// Secret bytes with a fixed capacity that are overwritten when dropped.
///
/// `Debug` never prints the value.
#[derive(Clone)]
pub struct Secret {
    bytes: Zeroizing<[u8; SECRET_MAX_LEN]>,
    len: usize,
}

impl Secret {
    pub fn new(value: &str) -> Result<Self, CapacityExceeded> {
        if value.len() > SECRET_MAX_LEN {
            return Err(CapacityExceeded {
                field: Field::Secret,
                len: value.len(),
            });
        }

        let mut bytes = Zeroizing::new([0u8; SECRET_MAX_LEN]);
        bytes[..value.len()].copy_from_slice(value.as_bytes());
        Ok(Self {
            bytes,
            len: value.len(),
        })
    }

    pub fn expose(&self) -> &str {
        // Only ever filled from a `&str`, so the prefix is valid UTF-8.
        str::from_utf8(&self.bytes[..self.len]).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for Secret {}

impl Zeroize for Secret {
    fn zeroize(&mut self) {
        self.bytes.zeroize();
        self.len = 0;
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.expose())
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SecretVisitor;

        impl Visitor<'_> for SecretVisitor {
            type Value = Secret;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a string of at most {SECRET_MAX_LEN} bytes")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Secret, E> {
                Secret::new(value).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(SecretVisitor)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(********)")
    }
}

/// Identity of a credential: at most one record exists per `(site, username)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialKey {
    pub site: Site,
    pub username: Username,
}

impl CredentialKey {
    pub fn new(site: &str, username: &str) -> Result<Self, CapacityExceeded> {
        Ok(Self {
            site: bounded(Field::Site, site)?,
            username: bounded(Field::Username, username)?,
        })
    }
}

/// Stored `(site, username, secret)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub site: Site,
    pub username: Username,
    pub secret: Secret,
}

impl CredentialRecord {
    pub fn new(site: &str, username: &str, secret: &str) -> Result<Self, CapacityExceeded> {
        let key = CredentialKey::new(site, username)?;
        Ok(Self::from_key(key, Secret::new(secret)?))
    }

    pub fn from_key(key: CredentialKey, secret: Secret) -> Self {
        Self {
            site: key.site,
            username: key.username,
            secret,
        }
    }

    pub fn key(&self) -> CredentialKey {
        CredentialKey {
            site: self.site.clone(),
            username: self.username.clone(),
        }
    }

    pub fn matches(&self, key: &CredentialKey) -> bool {
        self.site == key.site && self.username == key.username
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;
    use alloc::string::String as StdString;

    #[test]
    fn key_rejects_oversized_site_without_truncating() {
        let site: StdString = core::iter::repeat_n('s', SITE_MAX_LEN + 1).collect();
        let error = CredentialKey::new(&site, "bob").expect_err("site too long");
        assert_eq!(error.field, Field::Site);
        assert_eq!(error.len, SITE_MAX_LEN + 1);
    }

    #[test]
    fn fields_at_exact_capacity_are_accepted() {
        let site: StdString = core::iter::repeat_n('s', SITE_MAX_LEN).collect();
        let user: StdString = core::iter::repeat_n('u', USERNAME_MAX_LEN).collect();
        let secret: StdString = core::iter::repeat_n('p', SECRET_MAX_LEN).collect();

        let record = CredentialRecord::new(&site, &user, &secret).expect("record at capacity");
        assert_eq!(record.site.len(), SITE_MAX_LEN);
        assert_eq!(record.secret.len(), SECRET_MAX_LEN);
    }

    #[test]
    fn secret_debug_is_redacted() {
        let record = CredentialRecord::new("a.com", "bob", "hunter2").unwrap();
        let rendered = format!("{record:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("********"));
    }

    #[test]
    fn zeroize_clears_secret() {
        let mut secret = Secret::new("hunter2").unwrap();
        secret.zeroize();
        assert!(secret.is_empty());
        assert_eq!(secret.expose(), "");
    }

    #[test]
    fn matches_compares_both_identity_fields() {
        let record = CredentialRecord::new("a.com", "bob", "hunter2").unwrap();
        assert!(record.matches(&CredentialKey::new("a.com", "bob").unwrap()));
        assert!(!record.matches(&CredentialKey::new("a.com", "alice").unwrap()));
        assert!(!record.matches(&CredentialKey::new("b.com", "bob").unwrap()));
    }

    #[test]
    fn records_survive_postcard_round_trip() {
        let record = CredentialRecord::new("a.com", "bob", "hunter2").unwrap();
        let bytes = postcard::to_allocvec(&record).unwrap();
        let decoded: CredentialRecord = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn oversized_secret_is_rejected() {
        let secret: StdString = core::iter::repeat_n('p', SECRET_MAX_LEN + 1).collect();
        let error = Secret::new(&secret).expect_err("secret too long");
        assert_eq!(error.field, Field::Secret);
        assert_eq!(error.len, SECRET_MAX_LEN + 1);
    }

    #[test]
    fn oversized_secret_fails_to_decode() {
        let secret: StdString = core::iter::repeat_n('p', SECRET_MAX_LEN + 1).collect();
        let bytes = postcard::to_allocvec(&secret).unwrap();
        assert!(postcard::from_bytes::<Secret>(&bytes).is_err());
    }
}
