//! Branded scalar types wrapping the raw validation in [`crate::topic`].
//!
//! These give the client a way to validate a topic, filter, or client id once
//! at the API boundary and carry the proof of validity in the type instead of
//! re-checking (or forgetting to check) at every call site.

use core::fmt;

#[cfg(not(feature = "std"))]
use alloc::string::String;

use crate::topic::{validate_publish_topic, validate_subscribe_filter, TopicValidationError};

/// A validated publish topic name (no wildcards, no null byte, non-empty).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic(String);

impl Topic {
    pub fn try_new(value: impl Into<String>) -> Result<Self, TopicValidationError> {
        let value = value.into();
        validate_publish_topic(&value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Topic {
    type Error = TopicValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl<'a> TryFrom<&'a str> for Topic {
    type Error = TopicValidationError;

    fn try_from(value: &'a str) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

/// A validated subscribe topic filter (may contain `+`/`#` wildcards).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicFilter(String);

impl TopicFilter {
    pub fn try_new(value: impl Into<String>) -> Result<Self, TopicValidationError> {
        let value = value.into();
        validate_subscribe_filter(&value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for TopicFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TopicFilter {
    type Error = TopicValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl<'a> TryFrom<&'a str> for TopicFilter {
    type Error = TopicValidationError;

    fn try_from(value: &'a str) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

/// Error returned when a client identifier fails the length/charset rule
/// this crate enforces (the wire format itself accepts any UTF-8 string up
/// to 65535 bytes; this is a client-side sanity guard, not a protocol rule).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientIdError {
    TooLong,
}

impl fmt::Display for ClientIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientIdError::TooLong => write!(f, "client identifier exceeds 65535 bytes"),
        }
    }
}

/// A client identifier. Empty is allowed (server assigns one on CONNACK).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ClientId(String);

impl ClientId {
    pub fn try_new(value: impl Into<String>) -> Result<Self, ClientIdError> {
        let value = value.into();
        if value.len() > 65535 {
            return Err(ClientIdError::TooLong);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A non-zero MQTT packet identifier (1..=65535). Packet identifier 0 is
/// reserved and never assigned to an outstanding exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PacketIdentifier(u16);

impl PacketIdentifier {
    pub const MIN: u16 = 1;
    pub const MAX: u16 = u16::MAX;

    pub fn try_new(value: u16) -> Option<Self> {
        if value == 0 {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for PacketIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_accepts_leading_slash() {
        assert!(Topic::try_new("/leading/slash").is_ok());
    }

    #[test]
    fn topic_rejects_wildcards() {
        assert!(Topic::try_new("a/+/b").is_err());
    }

    #[test]
    fn topic_filter_accepts_wildcards_and_leading_slash() {
        assert!(TopicFilter::try_new("a/+/#").is_ok());
        assert!(TopicFilter::try_new("/").is_ok());
    }

    #[test]
    fn packet_identifier_rejects_zero() {
        assert_eq!(PacketIdentifier::try_new(0), None);
        assert_eq!(PacketIdentifier::try_new(1).unwrap().get(), 1);
    }

    #[test]
    fn client_id_rejects_oversized() {
        let long = "x".repeat(65536);
        assert!(matches!(
            ClientId::try_new(long),
            Err(ClientIdError::TooLong)
        ));
    }
}
