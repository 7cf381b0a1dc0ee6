use criterion::{BatchSize, Criterion, Throughput};
use libmqtt::network::application::mqtt::{Client, Message, MessageData, Options, Packet, Publish, QoS};
use libmqtt::network::application::pubsub::Config;
use std::hint::black_box;

use crate::network::{BenchTimer, Loopback};

const CONNACK: [u8; 4] = [0x20, 0x02, 0x00, 0x00];
const TOPIC: &str = "libmqtt/bench-topic";

fn frame(payload: &[u8]) -> Vec<u8> {
    let mut buf = [0u8; 256];
    let len = Packet::Publish(Publish {
        topic: TOPIC,
        message: Message::new(payload, QoS::AtMostOnce),
    })
    .serialize(&mut buf)
    .expect("Failed to serialize");
    buf[..len].to_vec()
}

fn setup_client(inbound: Vec<u8>) -> Client<Loopback, BenchTimer> {
    let conn = Loopback {
        greeting: Some(CONNACK.to_vec()),
        frame: inbound,
    };
    let mut client = Client::new(conn, BenchTimer::new(), Config::default()).expect("Failed to create client");
    let mut options = Options::new("libmqtt-bench");
    options.keep_alive_seconds = 0;
    client.connect(&options).expect("Failed to connect");
    client
}

fn on_message(data: &MessageData<'_>) {
    black_box(data.message.payload);
}

pub fn bench_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish");
    let payload = b"hello from publish";
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("publish_qos0", |b| {
        b.iter_batched_ref(
            || setup_client(Vec::new()),
            |client| {
                client
                    .publish(TOPIC, &Message::new(payload, QoS::AtMostOnce))
                    .expect("Failed to publish");
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

pub fn bench_poll(c: &mut Criterion) {
    let mut group = c.benchmark_group("poll");
    let payload = b"hello from poll";
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("poll_dispatch", |b| {
        let mut client = setup_client(frame(payload));
        client.set_default_handler(Some(on_message));
        b.iter(|| client.poll(0).expect("Failed to poll"))
    });
    group.finish();
}
