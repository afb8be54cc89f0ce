use bytes::{Buf, BufMut, BytesMut};

use mqtt5_core::codec::{Decoder, Encoder, VariableByteInteger};

#[derive(PartialEq, Eq, Debug)]
pub struct PingRespPacket {}

const PACKET_TYPE: u8 = 0x0d;

impl Encoder for PingRespPacket {
    fn encode(&self, buffer: &mut BytesMut) {
        buffer.put_u8(PACKET_TYPE << 4);

        let remaining_len = 0;
        VariableByteInteger(remaining_len).encode(buffer);
    }
}

impl Decoder for PingRespPacket {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        buffer.advance(1);
        let _ = VariableByteInteger::decode(buffer)?;
        Ok(Self {})
    }
}

#[cfg(test)]
mod tests {
    use bytes::{Bytes, BytesMut};

    use crate::pingresp::*;

    #[test]
    fn test_pingresp_encode_decode() {
        let expected = vec![0xd0, 0x00];

        let packet = PingRespPacket {};
        let mut encoded = BytesMut::new();
        packet.encode(&mut encoded);
        assert_eq!(encoded.to_vec(), expected);

        let mut bytes = Bytes::from(expected);
        let decoded = PingRespPacket::decode(&mut bytes).expect("Unexpected error");
        assert_eq!(packet, decoded);
    }
}
