use criterion::{Criterion, Throughput};
use libmqtt::network::application::mqttsn::{Message, Packet, Publish, QoS, TopicId};
use std::hint::black_box;

const PAYLOAD: &[u8] = b"23.5";

fn publish() -> Packet<'static> {
    let mut message = Message::new(PAYLOAD, QoS::AtLeastOnce);
    message.id = 42;
    Packet::Publish(Publish {
        topic: TopicId::Normal(0x0101),
        message,
    })
}

pub fn bench_serialize_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("mqttsn_serialize");
    group.throughput(Throughput::Bytes(PAYLOAD.len() as u64));
    let packet = publish();
    let mut buf = [0u8; 64];
    group.bench_function("publish", |b| {
        b.iter(|| black_box(&packet).serialize(black_box(&mut buf)).expect("Failed to serialize"))
    });
    group.finish();
}

pub fn bench_deserialize_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("mqttsn_deserialize");
    group.throughput(Throughput::Bytes(PAYLOAD.len() as u64));
    let mut buf = [0u8; 64];
    let len = publish().serialize(&mut buf).expect("Failed to serialize");
    group.bench_function("publish", |b| {
        b.iter(|| Packet::deserialize(black_box(&buf[..len])).expect("Failed to deserialize"))
    });
    group.finish();
}
