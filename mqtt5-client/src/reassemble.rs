//! Turns a stream of arbitrarily-fragmented byte chunks into whole decoded
//! packets.
//!
//! Bytes that don't yet form a complete packet are held in `carry` until the
//! next chunk arrives. A chunk ending mid-fixed-header, mid-variable-byte
//! integer, or mid-payload all recover exactly: nothing is lost, nothing is
//! re-parsed twice.

use bytes::BytesMut;
use mqtt5_core::{
    codec::{Decoder, VariableByteInteger},
    error::Error,
    protocol::ProtocolVersion,
};
use mqtt5_packets::ControlPacket;

use crate::error::{ClientError, Result};

pub struct Reassembler {
    carry: BytesMut,
    protocol_version: ProtocolVersion,
}

impl Reassembler {
    pub fn new(protocol_version: ProtocolVersion) -> Self {
        Self {
            carry: BytesMut::new(),
            protocol_version,
        }
    }

    pub fn set_protocol_version(&mut self, version: ProtocolVersion) {
        self.protocol_version = version;
    }

    /// Discard any partially-assembled packet. Used when a connection is
    /// torn down and replaced — carry from the old byte stream must never
    /// leak into the new one.
    pub fn reset(&mut self) {
        self.carry.clear();
    }

    /// Feed freshly-read bytes and return every packet that became complete
    /// as a result. A decode failure on a complete frame is returned
    /// immediately; the transformer does not try to resynchronize on its
    /// own, since that would silently lose bytes.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<ControlPacket>> {
        self.carry.extend_from_slice(chunk);

        let mut packets = Vec::new();

        loop {
            if self.carry.is_empty() {
                break;
            }

            let mut cursor: &[u8] = &self.carry[1..];
            let remaining_length = match VariableByteInteger::decode(&mut cursor) {
                Ok(len) => len,
                Err(Error::PacketIncomplete) => break,
                Err(e) => return Err(ClientError::Packet(e)),
            };

            let header_len = self.carry.len() - cursor.len();
            let total_len = header_len + remaining_length.0 as usize;

            if self.carry.len() < total_len {
                break;
            }

            let mut frame = self.carry.split_to(total_len);
            match ControlPacket::parse_with_version(&mut frame, self.protocol_version) {
                Ok(packet) => packets.push(packet),
                Err(e) => return Err(ClientError::Packet(e)),
            }
        }

        Ok(packets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mqtt5_core::codec::Encoder;
    use mqtt5_packets::pingreq::PingReqPacket;

    #[test]
    fn reassembles_a_whole_packet_delivered_in_one_chunk() {
        let mut reassembler = Reassembler::new(ProtocolVersion::V5);
        let packets = reassembler.feed(&[0xc0, 0x00]).unwrap();
        assert_eq!(packets.len(), 1);
    }

    #[test]
    fn carries_a_chunk_split_mid_remaining_length() {
        let mut encoded = BytesMut::new();
        PingReqPacket {}.encode(&mut encoded);
        assert_eq!(encoded.len(), 2);

        let mut reassembler = Reassembler::new(ProtocolVersion::V5);
        assert!(reassembler.feed(&encoded[..1]).unwrap().is_empty());
        let packets = reassembler.feed(&encoded[1..]).unwrap();
        assert_eq!(packets.len(), 1);
    }

    #[test]
    fn carries_a_chunk_split_mid_payload_and_yields_multiple_packets() {
        let mut one = BytesMut::new();
        PingReqPacket {}.encode(&mut one);
        let mut two = BytesMut::new();
        PingReqPacket {}.encode(&mut two);

        let mut combined = BytesMut::new();
        combined.extend_from_slice(&one);
        combined.extend_from_slice(&two);

        let mut reassembler = Reassembler::new(ProtocolVersion::V5);
        let first_chunk_len = one.len() + 1;
        let first = reassembler.feed(&combined[..first_chunk_len]).unwrap();
        assert_eq!(first.len(), 1);

        let second = reassembler.feed(&combined[first_chunk_len..]).unwrap();
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn reset_drops_a_partial_frame() {
        let mut reassembler = Reassembler::new(ProtocolVersion::V5);
        reassembler.feed(&[0xc0]).unwrap();
        reassembler.reset();
        assert!(reassembler.carry.is_empty());
    }
}
