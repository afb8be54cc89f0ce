use bytes::{Buf, BufMut, BytesMut};

use mqtt5_core::codec::{Decoder, Encoder, VariableByteInteger};

#[derive(PartialEq, Eq, Debug)]
pub struct PingReqPacket {}

const PACKET_TYPE: u8 = 0x0c;

impl Encoder for PingReqPacket {
    fn encode(&self, buffer: &mut BytesMut) {
        buffer.put_u8(PACKET_TYPE << 4);

        let remaining_len = 0;
        VariableByteInteger(remaining_len).encode(buffer);
    }
}

impl Decoder for PingReqPacket {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        buffer.advance(1);
        let _ = VariableByteInteger::decode(buffer)?;
        Ok(Self {})
    }
}

#[cfg(test)]
mod tests {
    use bytes::{Bytes, BytesMut};

    use crate::pingreq::*;

    #[test]
    fn test_pingreq_encode_decode() {
        let expected = vec![0xc0, 0x00];

        let packet = PingReqPacket {};
        let mut encoded = BytesMut::new();
        packet.encode(&mut encoded);
        assert_eq!(encoded.to_vec(), expected);

        let mut bytes = Bytes::from(expected);
        let decoded = PingReqPacket::decode(&mut bytes).expect("Unexpected error");
        assert_eq!(packet, decoded);
    }
}
