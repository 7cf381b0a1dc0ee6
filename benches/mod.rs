use criterion::{criterion_group, criterion_main};

mod network;

criterion_group!(
    benches,
    network::application::mqtt::packet::bench_serialize_publish,
    network::application::mqtt::packet::bench_deserialize_publish,
    network::application::mqtt::client::bench_publish,
    network::application::mqtt::client::bench_poll,
    network::application::mqttsn::packet::bench_serialize_publish,
    network::application::mqttsn::packet::bench_deserialize_publish
);
criterion_main!(benches);
