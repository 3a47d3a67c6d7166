//! Result payload container.
//!
//! Operations complete with an optional [`Payload`]: a cheaply cloneable
//! byte buffer with UTF-8 and JSON accessors. The distinction between a
//! *valid empty* payload (`Payload::empty()`) and an *absent* payload
//! (`None` from the engine) is load-bearing: `Future::get` succeeds on the
//! former and fails with `NoPayload` on the latter.

use std::rc::Rc;

use crate::error::{Error, ErrorKind};

/// Bytes produced by a completed operation.
///
/// Clones share the underlying buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    bytes: Rc<[u8]>,
}

impl Payload {
    /// Creates a payload from raw bytes.
    #[must_use]
    pub fn new(bytes: impl Into<Rc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Creates a valid zero-length payload.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            bytes: Rc::from(&[][..]),
        }
    }

    /// Returns the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if the payload is zero-length.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Interprets the payload as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns `MalformedPayload` if the bytes are not valid UTF-8.
    pub fn as_str(&self) -> Result<&str, Error> {
        std::str::from_utf8(&self.bytes).map_err(|e| {
            Error::new(ErrorKind::MalformedPayload)
                .with_message("payload is not valid UTF-8")
                .with_source(e)
        })
    }

    /// Decodes the payload as JSON.
    ///
    /// # Errors
    ///
    /// Returns `MalformedPayload` if the bytes do not parse as the
    /// requested type.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_slice(&self.bytes).map_err(|e| {
            Error::new(ErrorKind::MalformedPayload)
                .with_message("payload is not valid JSON")
                .with_source(e)
        })
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes().to_vec())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::new(s.into_bytes())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_valid_and_zero_length() {
        let p = Payload::empty();
        assert!(p.is_empty());
        assert_eq!(p.len(), 0);
        assert_eq!(p.as_bytes(), &[] as &[u8]);
    }

    #[test]
    fn utf8_accessor() {
        let p = Payload::from("pong");
        assert_eq!(p.as_str().unwrap(), "pong");

        let bad = Payload::new(vec![0xff, 0xfe]);
        let err = bad.as_str().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedPayload);
    }

    #[test]
    fn json_accessor() {
        let p = Payload::from(r#"{"seq": 3, "node": "broker-0"}"#);
        let value: serde_json::Value = p.json().unwrap();
        assert_eq!(value["seq"], 3);
        assert_eq!(value["node"], "broker-0");

        let err = Payload::from("not json").json::<serde_json::Value>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedPayload);
    }

    #[test]
    fn clones_share_bytes() {
        let p = Payload::from("shared");
        let q = p.clone();
        assert_eq!(p, q);
        assert_eq!(q.as_bytes(), b"shared");
    }
}
