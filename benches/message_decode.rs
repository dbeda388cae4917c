//! Benchmarks for the host message hot path
//!
//! Covers the work done once per poll interval while a session is open:
//! - Tagged decoding of raw host messages
//! - Telemetry record decoding against the registered definition
//! - A full notification drain through the client with an in-memory host
//!
//! Platform: Cross-platform (synthetic messages, CI-safe)

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use simwatch::schema::DataDefinition;
use simwatch::test_utils::{
    RecordingHost, cessna, encode_exception, encode_open, encode_record, encode_telemetry_reply,
};
use simwatch::{ClientConfig, HostMessage, SimClient};
use std::hint::black_box;

fn bench_message_decode(c: &mut Criterion) {
    let reply = encode_telemetry_reply(&cessna());
    let open = encode_open("Microsoft Flight Simulator");
    let exception = encode_exception(7);

    let mut group = c.benchmark_group("host_message_decode");
    group.throughput(Throughput::Bytes(reply.len() as u64));

    group.bench_function("data_reply", |b| {
        b.iter(|| HostMessage::decode(black_box(&reply)).expect("decodes"))
    });
    group.bench_function("open", |b| {
        b.iter(|| HostMessage::decode(black_box(&open)).expect("decodes"))
    });
    group.bench_function("exception", |b| {
        b.iter(|| HostMessage::decode(black_box(&exception)).expect("decodes"))
    });

    group.finish();
}

fn bench_record_decode(c: &mut Criterion) {
    let definition = DataDefinition::telemetry();
    let payload = encode_record(&cessna());

    let mut group = c.benchmark_group("telemetry_record_decode");
    group.throughput(Throughput::Bytes(payload.len() as u64));

    group.bench_function("decode_record", |b| {
        b.iter(|| definition.decode_record(black_box(&payload)).expect("decodes"))
    });
    group.bench_function("decode_values", |b| {
        b.iter(|| definition.decode(black_box(&payload)).expect("decodes"))
    });

    group.finish();
}

fn bench_notification_drain(c: &mut Criterion) {
    let host = RecordingHost::new();
    let config = ClientConfig::default();
    let tag = config.notify_tag;
    let (mut client, _notifications) = SimClient::new(host.clone(), (), config);

    client.connect().expect("in-memory host connects");
    host.push_message(encode_open("Microsoft Flight Simulator"));
    client.on_notification(tag);
    assert!(client.is_open());

    let reply = encode_telemetry_reply(&cessna());

    c.bench_function("notification_drain_single_reply", |b| {
        b.iter(|| {
            host.push_message(reply.clone());
            black_box(client.on_notification(tag))
        })
    });
}

criterion_group!(benches, bench_message_decode, bench_record_decode, bench_notification_drain);
criterion_main!(benches);
