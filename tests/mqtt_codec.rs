use heapless::Vec;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use libmqtt::network::application::mqtt::packet::{self, mark_dup};
use libmqtt::network::application::mqtt::{
    Ack, ConnAckResult, Message, Options, Packet, PacketType, ProtocolVersion, Publish, QoS,
    SubAck, SubAckResult, Subscribe, Unsubscribe, Will,
};
use libmqtt::network::application::pubsub::Error;

fn encode(packet: &Packet<'_>) -> std::vec::Vec<u8> {
    let mut buf = [0u8; 512];
    let len = packet.serialize(&mut buf).unwrap();
    assert_eq!(packet.encoded_len(), Ok(len));
    buf[..len].to_vec()
}

fn round_trip(packet: Packet<'_>) {
    let bytes = encode(&packet);
    let (decoded, consumed) = Packet::deserialize(&bytes).unwrap();
    assert_eq!(consumed, bytes.len());
    assert_eq!(decoded, packet);
}

fn sample_packets() -> std::vec::Vec<Packet<'static>> {
    let mut filters = Vec::new();
    filters.push(("sensors/+/temp", QoS::AtLeastOnce)).unwrap();
    filters.push(("alerts/#", QoS::ExactlyOnce)).unwrap();
    let mut unsub_filters = Vec::new();
    unsub_filters.push("sensors/+/temp").unwrap();
    let mut results = Vec::new();
    results.push(SubAckResult::Granted(QoS::AtLeastOnce)).unwrap();
    results.push(SubAckResult::Rejected).unwrap();

    let mut with_will = Options::new("device-1");
    with_will.will = Some(Will {
        topic: "status/device-1",
        message: b"offline",
        qos: QoS::AtLeastOnce,
        retained: true,
    });
    with_will.username = Some("alice");
    with_will.password = Some(b"secret");
    with_will.keep_alive_seconds = 0;
    with_will.clean_session = false;

    let mut legacy = Options::new("old");
    legacy.version = ProtocolVersion::V3_1;

    let mut dup_publish = Message::new(b"again", QoS::ExactlyOnce).retained();
    dup_publish.dup = true;
    dup_publish.id = 65_535;
    let mut qos1 = Message::new(b"", QoS::AtLeastOnce);
    qos1.id = 1;

    vec![
        Packet::Connect(Options::new("")),
        Packet::Connect(with_will),
        Packet::Connect(legacy),
        Packet::ConnAck(ConnAckResult {
            return_code: 0,
            session_present: true,
        }),
        Packet::ConnAck(ConnAckResult {
            return_code: 5,
            session_present: false,
        }),
        Packet::Publish(Publish {
            topic: "a/b",
            message: Message::new(b"hello", QoS::AtMostOnce),
        }),
        Packet::Publish(Publish {
            topic: "a/b",
            message: dup_publish,
        }),
        Packet::Publish(Publish {
            topic: "x",
            message: qos1,
        }),
        Packet::PubAck(Ack::new(1)),
        Packet::PubRec(Ack::new(2)),
        Packet::PubRel(Ack::new(3)),
        Packet::PubRel(Ack { packet_id: 3, dup: true }),
        Packet::PubComp(Ack::new(4)),
        Packet::Subscribe(Subscribe {
            packet_id: 10,
            dup: false,
            filters,
        }),
        Packet::SubAck(SubAck {
            packet_id: 10,
            results,
        }),
        Packet::Unsubscribe(Unsubscribe {
            packet_id: 11,
            dup: true,
            filters: unsub_filters,
        }),
        Packet::UnsubAck(Ack::new(11)),
        Packet::PingReq,
        Packet::PingResp,
        Packet::Disconnect,
    ]
}

#[test]
fn test_every_packet_type_round_trips() {
    for packet in sample_packets() {
        round_trip(packet);
    }
}

#[test]
fn test_publish_wire_format() {
    let mut message = Message::new(b"hello", QoS::ExactlyOnce);
    message.id = 0x0102;
    let bytes = encode(&Packet::Publish(Publish { topic: "a/b", message }));
    assert_eq!(
        bytes,
        [0x34, 0x0C, 0x00, 0x03, b'a', b'/', b'b', 0x01, 0x02, b'h', b'e', b'l', b'l', b'o']
    );
}

#[test]
fn test_connect_wire_format() {
    let mut options = Options::new("c1");
    options.keep_alive_seconds = 60;
    let bytes = encode(&Packet::Connect(options));
    assert_eq!(
        bytes,
        [0x10, 0x0E, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x02, 0x00, 0x3C, 0x00, 0x02, b'c', b'1']
    );
}

#[test]
fn test_fixed_header_flags() {
    assert_eq!(encode(&Packet::PubRel(Ack::new(1)))[0], 0x62);
    assert_eq!(encode(&Packet::PingReq), [0xC0, 0x00]);
    assert_eq!(encode(&Packet::PingResp), [0xD0, 0x00]);
    assert_eq!(encode(&Packet::Disconnect), [0xE0, 0x00]);
    assert_eq!(PacketType::from_header(0x82), Ok(PacketType::Subscribe));
    assert_eq!(PacketType::from_header(0x00), Err(Error::MalformedPacket));
    assert_eq!(PacketType::from_header(0xF0), Err(Error::MalformedPacket));
    assert!(packet::header_dup(0x3A));
    assert_eq!(packet::header_qos(0x3A), Ok(QoS::AtLeastOnce));
    assert_eq!(packet::header_qos(0x36), Err(Error::MalformedPacket));
    assert!(packet::header_retain(0x31));
}

#[test]
fn test_connect_password_requires_username() {
    // username "alice", empty password, both flags set
    let ok = [
        0x10, 0x16, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0xC2, 0x00, 0x3C, 0x00, 0x01, b'c',
        0x00, 0x05, b'a', b'l', b'i', b'c', b'e', 0x00, 0x00,
    ];
    let (packet, _) = Packet::deserialize(&ok).unwrap();
    let options = match packet {
        Packet::Connect(options) => options,
        other => panic!("expected CONNECT, got {other:?}"),
    };
    assert_eq!(options.username, Some("alice"));
    assert_eq!(options.password, Some(&b""[..]));

    // username "alice" only
    let username_only = [
        0x10, 0x14, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x82, 0x00, 0x3C, 0x00, 0x01, b'c',
        0x00, 0x05, b'a', b'l', b'i', b'c', b'e',
    ];
    let (packet, _) = Packet::deserialize(&username_only).unwrap();
    assert!(matches!(packet, Packet::Connect(Options { username: Some("alice"), password: None, .. })));

    // password flag without username flag
    let mut bad = ok;
    bad[9] = 0x42;
    assert_eq!(Packet::deserialize(&bad), Err(Error::MalformedPacket));

    let mut options = Options::new("c");
    options.password = Some(b"pw");
    let mut buf = [0u8; 64];
    assert_eq!(Packet::Connect(options).serialize(&mut buf), Err(Error::MalformedPacket));
}

#[test]
fn test_connect_protocol_name_must_match_exactly() {
    let good = encode(&Packet::Connect(Options::new("c")));

    // "MQT" with the level of 3.1.1
    let mut short = good.clone();
    short.remove(7);
    short[1] -= 1;
    short[3] = 3;
    assert_eq!(Packet::deserialize(&short), Err(Error::ProtocolMismatch));

    // right name, wrong level
    let mut level = good.clone();
    level[8] = 3;
    assert_eq!(Packet::deserialize(&level), Err(Error::ProtocolMismatch));

    // reserved flag bit
    let mut reserved = good;
    reserved[9] |= 0x01;
    assert_eq!(Packet::deserialize(&reserved), Err(Error::MalformedPacket));
}

#[test]
fn test_truncated_and_malformed_input() {
    let bytes = encode(&Packet::PubAck(Ack::new(9)));
    for len in 0..bytes.len() {
        assert_eq!(Packet::deserialize(&bytes[..len]), Err(Error::TruncatedInput));
    }

    // QoS 3
    assert_eq!(
        Packet::deserialize(&[0x36, 0x05, 0x00, 0x01, b'a', 0x00, 0x01]),
        Err(Error::MalformedPacket)
    );
    // QoS 0 with DUP
    assert_eq!(
        Packet::deserialize(&[0x38, 0x03, 0x00, 0x01, b'a']),
        Err(Error::MalformedPacket)
    );
    // PUBREL must carry QoS 1 in its header
    assert_eq!(Packet::deserialize(&[0x60, 0x02, 0x00, 0x01]), Err(Error::MalformedPacket));
    // topic length runs past the declared frame
    assert_eq!(Packet::deserialize(&[0x30, 0x02, 0x00, 0x09]), Err(Error::MalformedPacket));
    // remaining length with five bytes
    assert_eq!(
        Packet::deserialize(&[0x30, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]),
        Err(Error::MalformedPacket)
    );
    // SUBACK return code outside the allowed set
    assert_eq!(Packet::deserialize(&[0x90, 0x03, 0x00, 0x01, 0x03]), Err(Error::MalformedPacket));
    // SUBSCRIBE without filters
    assert_eq!(Packet::deserialize(&[0x82, 0x02, 0x00, 0x01]), Err(Error::MalformedPacket));
}

#[test]
fn test_deserialize_reports_frame_length() {
    let mut stream = encode(&Packet::PingResp);
    stream.extend(encode(&Packet::PubAck(Ack::new(3))));
    let (first, used) = Packet::deserialize(&stream).unwrap();
    assert_eq!(first, Packet::PingResp);
    assert_eq!(used, 2);
    let (second, used) = Packet::deserialize(&stream[2..]).unwrap();
    assert_eq!(second, Packet::PubAck(Ack::new(3)));
    assert_eq!(used, 4);
    assert_eq!(packet::frame_len(&stream[2..]), Ok(4));
}

#[test]
fn test_perturbed_input_never_reads_past_the_buffer() {
    let mut rng = StdRng::seed_from_u64(0x6d71_7474);
    let samples: std::vec::Vec<_> = sample_packets().iter().map(encode).collect();
    for _ in 0..2_000 {
        let mut bytes = samples[rng.gen_range(0..samples.len())].clone();
        for _ in 0..rng.gen_range(1..4) {
            let index = rng.gen_range(0..bytes.len());
            bytes[index] = rng.r#gen();
        }
        let cut = rng.gen_range(0..=bytes.len());
        let input = &bytes[..cut];
        // any outcome is fine as long as it stays inside `input`
        if let Ok((_, consumed)) = Packet::deserialize(input) {
            assert!(consumed <= input.len());
        }
    }
}

#[test]
fn test_serialize_into_short_buffer_writes_nothing() {
    let mut message = Message::new(b"hello", QoS::AtLeastOnce);
    message.id = 1;
    let packet = Packet::Publish(Publish { topic: "a/b", message });
    let needed = packet.encoded_len().unwrap();

    let mut buf = vec![0xAA; needed - 1];
    assert_eq!(packet.serialize(&mut buf), Err(Error::BufferTooSmall));
    assert!(buf.iter().all(|b| *b == 0xAA));

    let mut buf = vec![0xAA; needed];
    assert_eq!(packet.serialize(&mut buf), Ok(needed));
}

#[test]
fn test_empty_lists_are_rejected() {
    let mut buf = [0u8; 32];
    let subscribe = Packet::Subscribe(Subscribe {
        packet_id: 1,
        dup: false,
        filters: Vec::new(),
    });
    assert_eq!(subscribe.serialize(&mut buf), Err(Error::MalformedPacket));
    let suback = Packet::SubAck(SubAck {
        packet_id: 1,
        results: Vec::new(),
    });
    assert_eq!(suback.serialize(&mut buf), Err(Error::MalformedPacket));
}

#[test]
fn test_mark_dup() {
    let mut message = Message::new(b"x", QoS::AtLeastOnce);
    message.id = 4;
    let mut publish = encode(&Packet::Publish(Publish { topic: "t", message }));
    mark_dup(&mut publish);
    assert_eq!(publish[0], 0x3A);

    let mut pubrel = encode(&Packet::PubRel(Ack::new(4)));
    mark_dup(&mut pubrel);
    assert_eq!(pubrel, [0x62, 0x02, 0x00, 0x04]);

    let mut qos0 = encode(&Packet::Publish(Publish {
        topic: "t",
        message: Message::new(b"x", QoS::AtMostOnce),
    }));
    mark_dup(&mut qos0);
    assert_eq!(qos0[0], 0x30);

    let mut ping = encode(&Packet::PingReq);
    mark_dup(&mut ping);
    assert_eq!(ping[0], 0xC0);
    mark_dup(&mut []);
}

#[test]
fn test_large_publish_uses_multi_byte_length() {
    let payload = [0x5A; 300];
    let packet = Packet::Publish(Publish {
        topic: "big",
        message: Message::new(&payload, QoS::AtMostOnce),
    });
    let bytes = encode(&packet);
    assert_eq!(&bytes[..3], &[0x30, 0xB1, 0x02]);
    round_trip(packet);
}
