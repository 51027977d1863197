//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Benchmarks for NVT decode and encode throughput

use bytes::BytesMut;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use vtlink_telnet::TelnetCodec;

// ============================================================================
// Helper Functions
// ============================================================================

fn binary_codec() -> TelnetCodec {
    let mut codec = TelnetCodec::default();
    let mut sink = BytesMut::new();
    codec.decode_into(b"\xff\xfb\x00\xff\xfd\x00", &mut sink);
    codec.take_replies();
    codec
}

/// Terminal-like traffic: text lines with escape sequences and the odd IAC
fn sample(size: usize) -> Vec<u8> {
    let pattern = b"\x1b[1;32muser@host\x1b[0m:~$ ls -la\r\n\xff\xff";
    pattern.iter().copied().cycle().take(size).collect()
}

// ============================================================================
// Decoding Benchmarks
// ============================================================================

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    for size in [64usize, 1024, 4096] {
        let wire = sample(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("ascii", size), &wire, |b, wire| {
            let mut codec = TelnetCodec::default();
            let mut payload = BytesMut::with_capacity(size * 2);
            b.iter(|| {
                payload.clear();
                codec.decode_into(black_box(wire), &mut payload);
            });
        });
        group.bench_with_input(BenchmarkId::new("binary", size), &wire, |b, wire| {
            let mut codec = binary_codec();
            let mut payload = BytesMut::with_capacity(size * 2);
            b.iter(|| {
                payload.clear();
                codec.decode_into(black_box(wire), &mut payload);
            });
        });
    }
    group.finish();
}

// ============================================================================
// Encoding Benchmarks
// ============================================================================

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    for size in [64usize, 1024, 4096] {
        let data = sample(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("ascii", size), &data, |b, data| {
            let codec = TelnetCodec::default();
            let mut wire = BytesMut::with_capacity(size * 2);
            b.iter(|| {
                wire.clear();
                codec.encode_into(black_box(data), &mut wire, usize::MAX);
            });
        });
    }
    group.finish();
}

// ============================================================================
// Negotiation Benchmarks
// ============================================================================

fn bench_negotiation(c: &mut Criterion) {
    c.bench_function("negotiate_client_handshake", |b| {
        let wire = b"\xff\xfd\x00\xff\xfb\x00\xff\xfd\x03\xff\xfb\x03\xff\xfd\x1f\xff\xfd\x18\xff\xfa\x18\x01\xff\xf0";
        b.iter(|| {
            let mut codec = TelnetCodec::default();
            codec.start();
            let mut payload = BytesMut::new();
            codec.decode_into(black_box(wire), &mut payload);
            black_box(codec.take_replies());
        });
    });
}

criterion_group!(benches, bench_decode, bench_encode, bench_negotiation);
criterion_main!(benches);
