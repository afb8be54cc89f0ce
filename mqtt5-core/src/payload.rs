//! Shared representation for caller-supplied PUBLISH/Will payloads.
//!
//! MQTT 5 derives `payload_format_indicator` from whether a payload is a
//! UTF-8 string or opaque bytes; callers never set the property by hand.
//! [`PayloadData`] carries that distinction from the client API down to the
//! encoder, and [`derive_payload_format`] is the one place the indicator
//! value is computed, shared by PUBLISH and Will encoding so the rule can't
//! drift between the two call sites.

#[cfg(not(feature = "std"))]
use alloc::{string::String, vec::Vec};

use bytes::Bytes;

use crate::properties::PayloadFormatIndicator;

/// A payload as the caller supplies it, before it is flattened to bytes on
/// the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadData {
    Utf8(String),
    Bytes(Bytes),
}

impl PayloadData {
    pub fn len(&self) -> usize {
        match self {
            PayloadData::Utf8(s) => s.len(),
            PayloadData::Bytes(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            PayloadData::Utf8(s) => s.as_bytes(),
            PayloadData::Bytes(b) => b.as_ref(),
        }
    }

    /// Flattens to the bytes actually placed on the wire.
    pub fn into_bytes(self) -> Bytes {
        match self {
            PayloadData::Utf8(s) => Bytes::from(s.into_bytes()),
            PayloadData::Bytes(b) => b,
        }
    }
}

/// Derives the wire value of `payload_format_indicator` for a payload.
///
/// `Bytes` payloads leave the property unset entirely: "unspecified" is the
/// wire's absent-by-default state, not an explicit zero. Only a UTF-8
/// payload forces the property onto the wire.
pub fn derive_payload_format(data: &PayloadData) -> Option<PayloadFormatIndicator> {
    match data {
        PayloadData::Utf8(_) => Some(PayloadFormatIndicator::new(1)),
        PayloadData::Bytes(_) => None,
    }
}

impl From<String> for PayloadData {
    fn from(s: String) -> Self {
        PayloadData::Utf8(s)
    }
}

impl From<&str> for PayloadData {
    fn from(s: &str) -> Self {
        PayloadData::Utf8(s.to_owned())
    }
}

impl From<Bytes> for PayloadData {
    fn from(b: Bytes) -> Self {
        PayloadData::Bytes(b)
    }
}

impl From<Vec<u8>> for PayloadData {
    fn from(v: Vec<u8>) -> Self {
        PayloadData::Bytes(Bytes::from(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_payload_derives_format_indicator_one() {
        let data = PayloadData::from("hi");
        assert_eq!(derive_payload_format(&data), Some(PayloadFormatIndicator::new(1)));
    }

    #[test]
    fn bytes_payload_leaves_format_indicator_unset() {
        let data = PayloadData::from(Bytes::from_static(b"\x00\x01"));
        assert_eq!(derive_payload_format(&data), None);
    }

    #[test]
    fn into_bytes_round_trips_utf8_content() {
        let data = PayloadData::from("hi");
        assert_eq!(data.into_bytes(), Bytes::from_static(b"hi"));
    }
}
