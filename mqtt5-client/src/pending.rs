//! Reply-correlation table for packet-identifier-keyed request/response
//! exchanges (SUBSCRIBE/SUBACK, UNSUBSCRIBE/UNSUBACK).
//!
//! Identifier 0 is reserved by the wire format and never allocated here.
//! Allocation always picks the smallest free slot so a long-running client
//! with bursty traffic doesn't march monotonically into exhaustion.

use std::collections::HashMap;

use mqtt5_packets::ControlPacket;
use tokio::sync::oneshot;

use crate::error::{ClientError, Result};

pub struct PendingReplies {
    waiters: HashMap<u16, oneshot::Sender<ControlPacket>>,
}

impl PendingReplies {
    pub fn new() -> Self {
        Self {
            waiters: HashMap::new(),
        }
    }

    /// Allocate the smallest free packet identifier and register a waiter
    /// for its reply.
    pub fn register(&mut self) -> Result<(u16, oneshot::Receiver<ControlPacket>)> {
        let id = (1..=u16::MAX)
            .find(|id| !self.waiters.contains_key(id))
            .ok_or(ClientError::ResourceExhausted)?;

        let (tx, rx) = oneshot::channel();
        self.waiters.insert(id, tx);
        Ok((id, rx))
    }

    /// Resolve a pending reply. Returns `false` if `id` has no waiter — the
    /// caller should log and continue rather than treat this as fatal.
    pub fn resolve(&mut self, id: u16, packet: ControlPacket) -> bool {
        match self.waiters.remove(&id) {
            Some(tx) => {
                let _ = tx.send(packet);
                true
            }
            None => false,
        }
    }

    /// Drop every outstanding waiter. Their receivers observe a closed
    /// channel, which callers map to `ClientError::Disconnected`.
    pub fn reject_all(&mut self) {
        self.waiters.clear();
    }

    /// Release an identifier without resolving it. Used for QoS 1/2
    /// PUBLISH packets: a slot is reserved just long enough to pick an
    /// identifier that isn't a live SUBSCRIBE/UNSUBSCRIBE, then freed
    /// immediately since this client doesn't track PUBACK/PUBREC replies.
    pub fn release(&mut self, id: u16) {
        self.waiters.remove(&id);
    }
}

impl Default for PendingReplies {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_smallest_free_slot() {
        let mut pending = PendingReplies::new();
        let (first, _rx1) = pending.register().unwrap();
        let (second, _rx2) = pending.register().unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);

        pending.waiters.remove(&1);
        let (third, _rx3) = pending.register().unwrap();
        assert_eq!(third, 1);
    }

    #[test]
    fn unresolved_identifier_is_reported_but_not_fatal() {
        let mut pending = PendingReplies::new();
        let packet = ControlPacket::PingResp(mqtt5_packets::pingresp::PingRespPacket {});
        assert!(!pending.resolve(42, packet));
    }
}
