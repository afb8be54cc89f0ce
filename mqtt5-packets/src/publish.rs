use bytes::{Buf, Bytes, BytesMut};

use mqtt5_core::{
    codec::{Decoder, Encoder, VariableByteInteger},
    error::Error,
    payload::{derive_payload_format, PayloadData},
    properties::*,
    qos::QoS,
    reason::ReasonCode,
};

#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct PublishProperties {
    pub payload_format_indicator: Option<PayloadFormatIndicator>,
    pub message_expiry_interval: Option<MessageExpiryInterval>,
    pub topic_alias: Option<TopicAlias>,
    pub response_topic: Option<ResponseTopic>,
    pub correlation_data: Option<CorrelationData>,
    pub user_property: Option<Vec<UserProperty>>,
    pub subscription_identifier: Option<SubscriptionIdentifier>,
    pub content_type: Option<ContentType>,
}

impl Encoder for PublishProperties {
    fn encode(&self, buffer: &mut bytes::BytesMut) {
        self.payload_format_indicator.encode(buffer);
        self.message_expiry_interval.encode(buffer);
        self.topic_alias.encode(buffer);
        self.response_topic.encode(buffer);
        self.correlation_data.encode(buffer);
        self.user_property.encode(buffer);
        self.subscription_identifier.encode(buffer);
        self.content_type.encode(buffer);
    }

    fn encoded_size(&self) -> usize {
        let mut len = 0;

        len += self.payload_format_indicator.encoded_size();
        len += self.message_expiry_interval.encoded_size();
        len += self.topic_alias.encoded_size();
        len += self.response_topic.encoded_size();
        len += self.correlation_data.encoded_size();
        len += self.user_property.encoded_size();
        len += self.subscription_identifier.encoded_size();
        len += self.content_type.encoded_size();
        len
    }
}

impl Decoder for PublishProperties {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        use Property::*;

        let len = VariableByteInteger::decode(buffer)?;
        let mut properties = PublishProperties::default();

        if len.0 == 0 {
            return Ok(properties);
        } else if (buffer.remaining() as u32) < len.0 {
            return Err(Error::PacketIncomplete);
        }

        let mut encoded_properties = buffer.take(len.0 as usize);

        while encoded_properties.has_remaining() {
            match Property::decode(&mut encoded_properties)? {
                PayloadFormatIndicator(v) => properties.payload_format_indicator = Some(v),
                MessageExpiryInterval(v) => properties.message_expiry_interval = Some(v),
                TopicAlias(v) => properties.topic_alias = Some(v),
                ResponseTopic(v) => properties.response_topic = Some(v),
                CorrelationData(v) => properties.correlation_data = Some(v),
                UserProperty(v) => {
                    if let Some(vec) = &mut properties.user_property {
                        vec.push(v);
                    } else {
                        let vec = vec![v];
                        properties.user_property = Some(vec);
                    }
                }
                SubscriptionIdentifier(v) => properties.subscription_identifier = Some(v),
                ContentType(v) => properties.content_type = Some(v),
                _ => return Err(ReasonCode::MalformedPacket.into()),
            }
        }

        Ok(properties)
    }
}

#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct PublishPacket {
    pub dup: bool,
    pub qos_level: QoS,
    pub retain: bool,
    pub topic_name: String,
    pub packet_id: Option<u16>,
    pub properties: Option<PublishProperties>,
    pub payload: Option<PayloadData>,
}

const PACKET_TYPE: u8 = 0x03;

impl PublishPacket {
    /// Validates the structural rules the encoder is responsible for
    /// rejecting before a malformed packet ever reaches the wire.
    pub fn validate(&self) -> crate::Result<()> {
        match self.qos_level {
            QoS::AtMostOnce if self.packet_id.is_some() => {
                return Err(Error::PolicyViolation(
                    "PUBLISH at QoS 0 must not carry a packet identifier".into(),
                ));
            }
            QoS::AtLeastOnce | QoS::ExactlyOnce if self.packet_id.is_none() => {
                return Err(Error::PolicyViolation(
                    "PUBLISH at QoS 1/2 must carry a packet identifier".into(),
                ));
            }
            _ => {}
        }

        Ok(())
    }

    /// The properties to encode, with `payload_format_indicator` derived
    /// from the payload's logical type (§4.2: the encoder computes this, the
    /// caller never sets it directly).
    fn effective_properties(&self) -> PublishProperties {
        let mut properties = self.properties.clone().unwrap_or_default();

        if let Some(payload) = &self.payload {
            properties.payload_format_indicator = derive_payload_format(payload);
        }

        properties
    }
}

impl Encoder for PublishPacket {
    fn encode(&self, buffer: &mut BytesMut) {
        let mut remaining_len = 0;

        // Fixed header
        let mut fixed_header: u8 = PACKET_TYPE << 4;
        fixed_header |= (self.dup as u8) << 3;
        fixed_header |= (self.qos_level as u8) << 1;
        fixed_header |= self.retain as u8;
        fixed_header.encode(buffer);

        let properties = self.effective_properties();

        remaining_len += self.topic_name.encoded_size();
        remaining_len += self.packet_id.encoded_size();
        remaining_len += VariableByteInteger(properties.encoded_size() as u32).encoded_size();
        remaining_len += properties.encoded_size();

        if let Some(payload) = &self.payload {
            remaining_len += payload.len();
        }

        VariableByteInteger(remaining_len as u32).encode(buffer);

        // Variable header
        self.topic_name.encode(buffer);
        self.packet_id.encode(buffer);
        VariableByteInteger(properties.encoded_size() as u32).encode(buffer);
        properties.encode(buffer);

        // Payload. Here it goes raw, shouldn't be encoded
        if let Some(payload) = &self.payload {
            buffer.extend(payload.as_bytes());
        }
    }
}

impl Decoder for PublishPacket {
    fn decode<T: Buf>(buffer: &mut T) -> crate::Result<Self> {
        // Fixed header
        let fixed_header = buffer.get_u8();
        let dup = (fixed_header & 0b0000_1000) != 0;
        let qos_level = QoS::from((fixed_header & 0b0000_0110) >> 1);
        let retain = (fixed_header & 0b0000_0001) != 0;
        let remaining_len = VariableByteInteger::decode(buffer)?.0 as usize;

        // Variable header
        let topic_name = String::decode(buffer)?;
        let packet_id = match qos_level {
            QoS::AtMostOnce => None,
            QoS::Invalid => return Err(ReasonCode::MalformedPacket.into()),
            _ => Some(u16::decode(buffer)?),
        };

        let properties = Some(PublishProperties::decode(buffer)?);

        // Payload
        let payload_len = remaining_len
            - (topic_name.encoded_size()
                + packet_id.encoded_size()
                + properties.encoded_size()
                + VariableByteInteger(properties.encoded_size() as u32).encoded_size());

        if buffer.remaining() < payload_len {
            return Err(ReasonCode::MalformedPacket.into());
        }

        // The raw wire representation is always opaque bytes; it's up to the
        // client layer to reinterpret this per `PublishDeserializeOptions`
        // once `payload_format_indicator` is available alongside it.
        let payload = Some(PayloadData::Bytes(buffer.copy_to_bytes(payload_len)));

        Ok(PublishPacket {
            dup,
            qos_level,
            retain,
            topic_name,
            packet_id,
            properties,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use mqtt5_core::payload::PayloadData;

    use crate::publish::*;

    #[test]
    fn test_publish_packet_encode_decode() {
        let expected = vec![
            0x32, 0x28, 0x00, 0x0a, 0x74, 0x65, 0x73, 0x74, 0x5f, 0x74, 0x6f, 0x70, 0x69, 0x63,
            0x00, 0x01, 0x0d, 0x26, 0x00, 0x03, 0x6b, 0x65, 0x79, 0x00, 0x05, 0x76, 0x61, 0x6c,
            0x75, 0x65, 0x74, 0x65, 0x73, 0x74, 0x5f, 0x6d, 0x65, 0x73, 0x73, 0x61, 0x67, 0x65,
        ];

        let packet = PublishPacket {
            dup: false,
            qos_level: QoS::AtLeastOnce,
            retain: false,
            topic_name: "test_topic".to_string(),
            packet_id: Some(1),
            properties: PublishProperties {
                user_property: vec![UserProperty::new("key".to_string(), "value".to_string())]
                    .into(),
                ..Default::default()
            }
            .into(),
            payload: Some(PayloadData::Bytes(Bytes::from("test_message"))),
        };

        let mut encoded = BytesMut::new();
        packet.encode(&mut encoded);

        assert_eq!(encoded, expected);

        let mut bytes = Bytes::from(expected);

        let new_packet = PublishPacket::decode(&mut bytes).expect("Unexpected error");
        assert_eq!(packet, new_packet);
    }

    #[test]
    fn utf8_payload_derives_payload_format_indicator_one() {
        let packet = PublishPacket {
            dup: false,
            qos_level: QoS::AtMostOnce,
            retain: false,
            topic_name: "a/b".to_string(),
            packet_id: None,
            properties: None,
            payload: Some(PayloadData::Utf8("hi".to_string())),
        };

        let mut encoded = BytesMut::new();
        packet.encode(&mut encoded);

        let mut bytes = Bytes::from(encoded.to_vec());
        let decoded = PublishPacket::decode(&mut bytes).expect("Unexpected error");

        assert_eq!(
            decoded
                .properties
                .as_ref()
                .and_then(|p| p.payload_format_indicator.as_ref())
                .map(|p| p.value),
            Some(1)
        );
    }

    #[test]
    fn validate_rejects_packet_id_mismatched_with_qos() {
        let at_most_once_with_id = PublishPacket {
            qos_level: QoS::AtMostOnce,
            packet_id: Some(1),
            topic_name: "a/b".to_string(),
            ..Default::default()
        };
        assert!(at_most_once_with_id.validate().is_err());

        let at_least_once_without_id = PublishPacket {
            qos_level: QoS::AtLeastOnce,
            packet_id: None,
            topic_name: "a/b".to_string(),
            ..Default::default()
        };
        assert!(at_least_once_without_id.validate().is_err());

        let well_formed = PublishPacket {
            qos_level: QoS::AtLeastOnce,
            packet_id: Some(1),
            topic_name: "a/b".to_string(),
            ..Default::default()
        };
        assert!(well_formed.validate().is_ok());
    }
}
