use criterion::{Criterion, Throughput};
use libmqtt::network::application::mqtt::{Message, Packet, Publish, QoS};
use std::hint::black_box;

const PAYLOAD: &[u8] = b"{\"temperature\":23.5,\"humidity\":41}";

fn publish() -> Packet<'static> {
    let mut message = Message::new(PAYLOAD, QoS::AtLeastOnce);
    message.id = 42;
    Packet::Publish(Publish {
        topic: "libmqtt/bench/sensors/room-1",
        message,
    })
}

pub fn bench_serialize_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("mqtt_serialize");
    group.throughput(Throughput::Bytes(PAYLOAD.len() as u64));
    let packet = publish();
    let mut buf = [0u8; 256];
    group.bench_function("publish", |b| {
        b.iter(|| black_box(&packet).serialize(black_box(&mut buf)).expect("Failed to serialize"))
    });
    group.finish();
}

pub fn bench_deserialize_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("mqtt_deserialize");
    group.throughput(Throughput::Bytes(PAYLOAD.len() as u64));
    let mut buf = [0u8; 256];
    let len = publish().serialize(&mut buf).expect("Failed to serialize");
    group.bench_function("publish", |b| {
        b.iter(|| Packet::deserialize(black_box(&buf[..len])).expect("Failed to deserialize"))
    });
    group.finish();
}
