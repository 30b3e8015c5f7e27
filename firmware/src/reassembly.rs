//! Joins radio fragments into complete request payloads.
use alloc::vec::Vec;
use core::fmt;

use zeroize::{Zeroize, Zeroizing};

/// Upper bound (in bytes) for a single accumulated request.
pub const MAX_PAYLOAD_SIZE: usize = 256;

const OPENING_BRACE: u8 = b'{';
const CLOSING_BRACE: u8 = b'}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReassemblyError {
    /// Accumulated payload would exceed [`MAX_PAYLOAD_SIZE`]; the buffer was reset.
    PayloadTooLarge { len: usize, limit: usize },
}

impl fmt::Display for ReassemblyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReassemblyError::PayloadTooLarge { len, limit } => {
                write!(f, "payload of {len} bytes exceeds limit of {limit} bytes")
            }
        }
    }
}

impl core::error::Error for ReassemblyError {}

/// Accumulates fragments of one logical message at a time.
///
/// Every fragment handed to [`Reassembler::feed`] is scrubbed before the call returns,
/// whatever the outcome.
pub struct Reassembler {
    buffer: Zeroizing<Vec<u8>>,
    open: bool,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reassembler {
    pub fn new() -> Self {
        Self {
            buffer: Zeroizing::new(Vec::with_capacity(MAX_PAYLOAD_SIZE)),
            open: false,
        }
    }

    /// Returns `true` while a message has been opened but not completed.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Feed one fragment. Returns the complete payload once its closing brace arrives.
    pub fn feed(
        &mut self,
        fragment: &mut [u8],
    ) -> Result<Option<Zeroizing<Vec<u8>>>, ReassemblyError> {
        let result = self.accumulate(fragment);
        fragment.zeroize();
        result
    }

    fn accumulate(
        &mut self,
        fragment: &[u8],
    ) -> Result<Option<Zeroizing<Vec<u8>>>, ReassemblyError> {
        let data = trim_terminators(fragment);
        if data.is_empty() {
            return Ok(None);
        }

        if data[0] == OPENING_BRACE {
            if self.open {
                log::debug!("discarding {} bytes of unfinished message", self.buffer.len());
            }
            self.reset();
            self.open = true;
        } else if !self.open {
            log::debug!("dropping {} byte fragment outside a message", data.len());
            return Ok(None);
        }

        let len = self.buffer.len() + data.len();
        if len > MAX_PAYLOAD_SIZE {
            self.reset();
            return Err(ReassemblyError::PayloadTooLarge {
                len,
                limit: MAX_PAYLOAD_SIZE,
            });
        }

        self.buffer.extend_from_slice(data);

        if data.last() == Some(&CLOSING_BRACE) {
            self.open = false;
            let payload = core::mem::replace(
                &mut self.buffer,
                Zeroizing::new(Vec::with_capacity(MAX_PAYLOAD_SIZE)),
            );
            return Ok(Some(payload));
        }

        Ok(None)
    }

    fn reset(&mut self) {
        self.buffer.zeroize();
        self.open = false;
    }
}

fn trim_terminators(fragment: &[u8]) -> &[u8] {
    let end = fragment
        .iter()
        .rposition(|&byte| byte != b'\r' && byte != b'\n')
        .map_or(0, |index| index + 1);
    &fragment[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn feed_str(reassembler: &mut Reassembler, text: &str) -> Option<Vec<u8>> {
        let mut bytes = text.as_bytes().to_vec();
        reassembler
            .feed(&mut bytes)
            .expect("fragment within bounds")
            .map(|payload| payload.to_vec())
    }

    #[test]
    fn single_fragment_message_completes_immediately() {
        let mut reassembler = Reassembler::new();
        let payload = feed_str(&mut reassembler, r#"{"site":"a.com","user":"bob"}"#);
        assert_eq!(
            payload.as_deref(),
            Some(&br#"{"site":"a.com","user":"bob"}"#[..])
        );
        assert!(!reassembler.is_open());
    }

    #[test]
    fn split_message_is_joined_in_order() {
        let mut reassembler = Reassembler::new();
        assert_eq!(feed_str(&mut reassembler, r#"{"site":"a."#), None);
        assert!(reassembler.is_open());
        assert_eq!(feed_str(&mut reassembler, r#"com","user""#), None);
        let payload = feed_str(&mut reassembler, r#":"bob"}"#).expect("complete payload");
        assert_eq!(payload, br#"{"site":"a.com","user":"bob"}"#);
    }

    #[test]
    fn trailing_line_terminators_are_ignored() {
        let mut reassembler = Reassembler::new();
        let payload = feed_str(&mut reassembler, "{\"site\":\"a\",\"user\":\"b\"}\r\n")
            .expect("complete payload");
        assert_eq!(payload, br#"{"site":"a","user":"b"}"#);
        assert_eq!(feed_str(&mut reassembler, "\r\n"), None);
    }

    #[test]
    fn opening_brace_discards_partial_message() {
        let mut reassembler = Reassembler::new();
        assert_eq!(feed_str(&mut reassembler, r#"{"site":"stale"#), None);
        let payload = feed_str(&mut reassembler, r#"{"site":"a","user":"b"}"#)
            .expect("complete payload");
        assert_eq!(payload, br#"{"site":"a","user":"b"}"#);
    }

    #[test]
    fn stray_fragment_without_open_message_is_dropped() {
        let mut reassembler = Reassembler::new();
        assert_eq!(feed_str(&mut reassembler, r#""user":"b"}"#), None);
        assert!(!reassembler.is_open());
    }

    #[test]
    fn oversized_payload_resets_buffer() {
        let mut reassembler = Reassembler::new();
        let mut head = vec![b'{'];
        head.extend(core::iter::repeat_n(b'a', MAX_PAYLOAD_SIZE));

        let error = reassembler.feed(&mut head).expect_err("payload too large");
        assert_eq!(
            error,
            ReassemblyError::PayloadTooLarge {
                len: MAX_PAYLOAD_SIZE + 1,
                limit: MAX_PAYLOAD_SIZE,
            }
        );
        assert!(!reassembler.is_open());

        assert_eq!(feed_str(&mut reassembler, "tail}"), None);
        let payload = feed_str(&mut reassembler, "{}").expect("fresh message");
        assert_eq!(payload, b"{}");
    }

    #[test]
    fn payload_at_exact_limit_is_accepted() {
        let mut reassembler = Reassembler::new();
        let mut message = vec![b'{'];
        message.extend(core::iter::repeat_n(b' ', MAX_PAYLOAD_SIZE - 2));
        message.push(b'}');

        let payload = reassembler
            .feed(&mut message)
            .expect("within bounds")
            .expect("complete payload");
        assert_eq!(payload.len(), MAX_PAYLOAD_SIZE);
    }

    #[test]
    fn fragments_are_scrubbed_after_feeding() {
        let mut reassembler = Reassembler::new();
        let mut fragment = br#"{"pwd":"hunter2""#.to_vec();
        reassembler.feed(&mut fragment).unwrap();
        assert!(fragment.iter().all(|&byte| byte == 0));

        let mut stray = b"hunter2".to_vec();
        let mut fresh = Reassembler::new();
        fresh.feed(&mut stray).unwrap();
        assert!(stray.iter().all(|&byte| byte == 0));

        let mut oversized = vec![b'{'; MAX_PAYLOAD_SIZE + 1];
        assert!(fresh.feed(&mut oversized).is_err());
        assert!(oversized.iter().all(|&byte| byte == 0));
    }
}
