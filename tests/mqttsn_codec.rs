use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use libmqtt::network::application::mqttsn::packet::{self, flags_qos, mark_dup};
use libmqtt::network::application::mqttsn::{
    Connect, Decoded, MsgType, Options, Packet, Publish, Register, ReturnCode, SubAck, Subscribe,
    TopicAck, TopicId, Unsubscribe, Will, WillTopic,
};
use libmqtt::network::application::pubsub::{Error, Message, QoS};

fn encode(packet: &Packet<'_>) -> Vec<u8> {
    let mut buf = [0u8; 512];
    let len = packet.serialize(&mut buf).unwrap();
    assert_eq!(packet.encoded_len(), Ok(len));
    buf[..len].to_vec()
}

fn round_trip(packet: Packet<'_>) {
    let bytes = encode(&packet);
    let (decoded, consumed) = Packet::deserialize(&bytes).unwrap();
    assert_eq!(consumed, bytes.len());
    assert_eq!(decoded, Decoded::Packet(packet));
}

fn message(payload: &[u8], qos: QoS, id: u16) -> Message<'_> {
    let mut message = Message::new(payload, qos);
    message.id = id;
    message
}

fn sample_packets() -> Vec<Packet<'static>> {
    let mut retained_dup = message(b"dup", QoS::ExactlyOnce, 9).retained();
    retained_dup.dup = true;
    let accepted = TopicAck {
        topic_id: 5,
        msg_id: 1,
        return_code: ReturnCode::Accepted,
    };
    vec![
        Packet::ConnAck(ReturnCode::Accepted),
        Packet::ConnAck(ReturnCode::Congestion),
        Packet::WillTopicReq,
        Packet::WillTopic(WillTopic {
            qos: QoS::AtLeastOnce,
            retained: true,
            topic: "status/node-7",
        }),
        Packet::WillMsgReq,
        Packet::WillMsg(b"offline"),
        Packet::Register(Register {
            topic_id: 0,
            msg_id: 1,
            topic_name: "sensors/temp",
        }),
        Packet::RegAck(accepted),
        Packet::Publish(Publish {
            topic: TopicId::Normal(5),
            message: message(b"21.5", QoS::AtLeastOnce, 2),
        }),
        Packet::Publish(Publish {
            topic: TopicId::Predefined(0x1234),
            message: retained_dup,
        }),
        Packet::Publish(Publish {
            topic: TopicId::Short(*b"tp"),
            message: message(b"", QoS::AtMostOnce, 0),
        }),
        Packet::PubAck(TopicAck {
            return_code: ReturnCode::InvalidTopicId,
            ..accepted
        }),
        Packet::PubRec(3),
        Packet::PubRel(3),
        Packet::PubComp(3),
        Packet::Subscribe(Subscribe {
            msg_id: 4,
            dup: false,
            qos: QoS::ExactlyOnce,
            topic: TopicId::Name("sensors/#"),
        }),
        Packet::Subscribe(Subscribe {
            msg_id: 5,
            dup: true,
            qos: QoS::AtMostOnce,
            topic: TopicId::Predefined(7),
        }),
        Packet::SubAck(SubAck {
            qos: QoS::AtLeastOnce,
            topic_id: 5,
            msg_id: 4,
            return_code: ReturnCode::Accepted,
        }),
        Packet::Unsubscribe(Unsubscribe {
            msg_id: 6,
            topic: TopicId::Short(*b"ab"),
        }),
        Packet::UnsubAck(6),
        Packet::PingReq(None),
        Packet::PingReq(Some("node-7")),
        Packet::PingResp,
        Packet::Disconnect(None),
        Packet::Disconnect(Some(600)),
    ]
}

#[test]
fn test_every_message_type_round_trips() {
    for packet in sample_packets() {
        round_trip(packet);
    }
}

#[test]
fn test_connect_decodes_to_connect_view() {
    let mut options = Options::new("c1");
    options.will = Some(Will {
        topic: "w",
        message: b"bye",
        qos: QoS::AtMostOnce,
        retained: false,
    });
    let bytes = encode(&Packet::Connect(options));
    assert_eq!(bytes, [0x08, 0x04, 0x0C, 0x01, 0x00, 0x3C, b'c', b'1']);

    let (decoded, used) = Packet::deserialize(&bytes).unwrap();
    assert_eq!(used, 8);
    assert_eq!(
        decoded,
        Decoded::Connect(Connect {
            client_id: "c1",
            duration: 60,
            clean_session: true,
            will: true,
        })
    );

    let mut other_protocol = bytes.clone();
    other_protocol[3] = 0x02;
    assert_eq!(Packet::deserialize(&other_protocol), Err(Error::ProtocolMismatch));
}

#[test]
fn test_wire_layouts() {
    assert_eq!(encode(&Packet::PingReq(None)), [0x02, 0x16]);
    assert_eq!(encode(&Packet::PubRel(0x0102)), [0x04, 0x10, 0x01, 0x02]);
    assert_eq!(
        encode(&Packet::Register(Register {
            topic_id: 0,
            msg_id: 1,
            topic_name: "a/b",
        })),
        [0x09, 0x0A, 0x00, 0x00, 0x00, 0x01, b'a', b'/', b'b']
    );
    assert_eq!(
        encode(&Packet::Subscribe(Subscribe {
            msg_id: 1,
            dup: false,
            qos: QoS::AtLeastOnce,
            topic: TopicId::Name("a/b"),
        })),
        [0x08, 0x12, 0x20, 0x00, 0x01, b'a', b'/', b'b']
    );
    assert_eq!(
        encode(&Packet::Publish(Publish {
            topic: TopicId::Short(*b"hi"),
            message: message(b"x", QoS::AtMostOnce, 0).retained(),
        })),
        [0x08, 0x0C, 0x12, b'h', b'i', 0x00, 0x00, b'x']
    );
}

#[test]
fn test_long_length_form() {
    let payload = [0x42; 300];
    let packet = Packet::Publish(Publish {
        topic: TopicId::Normal(1),
        message: message(&payload, QoS::AtMostOnce, 0),
    });
    let bytes = encode(&packet);
    assert_eq!(bytes.len(), 309);
    assert_eq!(&bytes[..4], &[0x01, 0x01, 0x35, 0x0C]);
    assert_eq!(packet::frame_len(&bytes), Ok(309));
    round_trip(packet);

    // the largest packet that still uses one length byte
    let payload = [0x42; 248];
    let bytes = encode(&Packet::Publish(Publish {
        topic: TopicId::Normal(1),
        message: message(&payload, QoS::AtMostOnce, 0),
    }));
    assert_eq!(bytes[0], 0xFF);
}

#[test]
fn test_unencodable_topics() {
    let mut buf = [0u8; 32];
    let by_name = Packet::Publish(Publish {
        topic: TopicId::Name("a/b"),
        message: message(b"x", QoS::AtMostOnce, 0),
    });
    assert_eq!(by_name.serialize(&mut buf), Err(Error::MalformedPacket));
    let subscribe_normal = Packet::Subscribe(Subscribe {
        msg_id: 1,
        dup: false,
        qos: QoS::AtMostOnce,
        topic: TopicId::Normal(3),
    });
    assert_eq!(subscribe_normal.serialize(&mut buf), Err(Error::MalformedPacket));
}

#[test]
fn test_malformed_input() {
    // QoS bits 0b11
    assert_eq!(flags_qos(0x60), Err(Error::MalformedPacket));
    assert_eq!(
        Packet::deserialize(&[0x07, 0x0C, 0x60, 0x00, 0x01, 0x00, 0x00]),
        Err(Error::MalformedPacket)
    );
    // topic id type 0b11
    assert_eq!(
        Packet::deserialize(&[0x07, 0x0C, 0x03, 0x00, 0x01, 0x00, 0x00]),
        Err(Error::MalformedPacket)
    );
    // unknown return code
    assert_eq!(Packet::deserialize(&[0x03, 0x05, 0x04]), Err(Error::MalformedPacket));
    // unknown message type
    assert_eq!(Packet::deserialize(&[0x02, 0x11]), Err(Error::MalformedPacket));
    // length too short to hold a message type
    assert_eq!(Packet::deserialize(&[0x01, 0x00, 0x03, 0x16]), Err(Error::MalformedPacket));
    assert_eq!(Packet::deserialize(&[0x00]), Err(Error::MalformedPacket));
    // REGACK one byte short
    assert_eq!(
        Packet::deserialize(&[0x06, 0x0B, 0x00, 0x05, 0x00, 0x01]),
        Err(Error::MalformedPacket)
    );
    // PUBLISH without its message id
    assert_eq!(Packet::deserialize(&[0x05, 0x0C, 0x00, 0x00, 0x01]), Err(Error::MalformedPacket));
    assert_eq!(MsgType::try_from(0x04), Ok(MsgType::Connect));
    assert_eq!(ReturnCode::try_from(0x03), Ok(ReturnCode::NotSupported));
}

#[test]
fn test_truncated_input() {
    let bytes = encode(&Packet::RegAck(TopicAck {
        topic_id: 1,
        msg_id: 2,
        return_code: ReturnCode::Accepted,
    }));
    for len in 0..bytes.len() {
        assert_eq!(Packet::deserialize(&bytes[..len]), Err(Error::TruncatedInput));
    }
    assert_eq!(packet::frame_len(&[0x01, 0x01]), Err(Error::TruncatedInput));
}

#[test]
fn test_serialize_into_short_buffer_writes_nothing() {
    let packet = Packet::Publish(Publish {
        topic: TopicId::Normal(5),
        message: message(b"hello", QoS::AtLeastOnce, 1),
    });
    let needed = packet.encoded_len().unwrap();
    let mut buf = vec![0xAA; needed - 1];
    assert_eq!(packet.serialize(&mut buf), Err(Error::BufferTooSmall));
    assert!(buf.iter().all(|b| *b == 0xAA));
}

#[test]
fn test_mark_dup() {
    let mut publish = encode(&Packet::Publish(Publish {
        topic: TopicId::Normal(5),
        message: message(b"on", QoS::AtLeastOnce, 1),
    }));
    mark_dup(&mut publish);
    assert_eq!(publish[2], 0xA0);

    let mut subscribe = encode(&Packet::Subscribe(Subscribe {
        msg_id: 1,
        dup: false,
        qos: QoS::AtLeastOnce,
        topic: TopicId::Name("a"),
    }));
    mark_dup(&mut subscribe);
    assert_eq!(subscribe[2], 0xA0);

    let register = Packet::Register(Register {
        topic_id: 0,
        msg_id: 1,
        topic_name: "a",
    });
    let mut bytes = encode(&register);
    mark_dup(&mut bytes);
    assert_eq!(bytes, encode(&register));

    let payload = [0u8; 300];
    let mut long = encode(&Packet::Publish(Publish {
        topic: TopicId::Normal(5),
        message: message(&payload, QoS::AtLeastOnce, 1),
    }));
    mark_dup(&mut long);
    assert_eq!(long[4], 0xA0);
}

#[test]
fn test_perturbed_input_never_reads_past_the_buffer() {
    let mut rng = StdRng::seed_from_u64(0x736e);
    let samples: Vec<_> = sample_packets().iter().map(encode).collect();
    for _ in 0..2_000 {
        let mut bytes = samples[rng.gen_range(0..samples.len())].clone();
        for _ in 0..rng.gen_range(1..4) {
            let index = rng.gen_range(0..bytes.len());
            bytes[index] = rng.r#gen();
        }
        let cut = rng.gen_range(0..=bytes.len());
        let input = &bytes[..cut];
        if let Ok((_, consumed)) = Packet::deserialize(input) {
            assert!(consumed <= input.len());
        }
    }
}
