//! Latency benchmarks for the relay hot path.
//!
//! Run with: `cargo bench --bench latency`

use alloy_primitives::{Address, Bytes, U256};
use alloy_signer_local::PrivateKeySigner;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;

use relay_core::api::MemoryForwarder;
use relay_core::calls::TokenCall;
use relay_core::signing::{
    digest, verify, DomainDescriptor, ForwardRequest, ForwardRequestSigner, SignedRequest,
    DEFAULT_MAX_DATA_BYTES,
};
use relay_engine::{RelayContext, RelayOrchestrator, RelaySettings};

const NOW: u64 = 1_700_000_000;

fn domain() -> DomainDescriptor {
    DomainDescriptor::new(137, Address::repeat_byte(0xf0))
}

fn request(data_len: usize) -> ForwardRequest {
    ForwardRequest {
        from: Address::repeat_byte(0xaa),
        to: Address::repeat_byte(0xbb),
        value: U256::ZERO,
        gas: U256::from(200_000u64),
        nonce: U256::from(7u64),
        data: Bytes::from(vec![0x42; data_len]),
        valid_until: U256::from(NOW + 3600),
    }
}

fn signed(signer: &ForwardRequestSigner, rt: &tokio::runtime::Runtime, nonce: u64) -> SignedRequest {
    let call = TokenCall::Transfer {
        to: Address::repeat_byte(0x22),
        amount: U256::from(1_000_000u64),
    };
    let request = signer.request(Address::repeat_byte(0xbb), call.encode(), U256::from(nonce), NOW);
    rt.block_on(signer.sign(request)).unwrap()
}

/// Benchmark typed-data digest computation across payload sizes.
fn bench_digest(c: &mut Criterion) {
    let mut group = c.benchmark_group("digest");
    let domain = domain();

    for size in [0usize, 68, 1024, 16 * 1024].iter() {
        let request = request(*size);
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::new("data_bytes", size), &request, |b, request| {
            b.iter(|| black_box(digest(black_box(&domain), black_box(request), DEFAULT_MAX_DATA_BYTES)))
        });
    }

    group.finish();
}

/// Benchmark signature recovery and comparison.
fn bench_verify(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let signer = ForwardRequestSigner::new(PrivateKeySigner::random(), domain());
    let signed = signed(&signer, &rt, 0);
    let hash = digest(&domain(), signed.request(), DEFAULT_MAX_DATA_BYTES).unwrap();
    let from = signed.from();

    let mut group = c.benchmark_group("verify");

    group.bench_function("valid", |b| {
        b.iter(|| black_box(verify(black_box(&hash), black_box(signed.signature()), &from)))
    });

    let mut tampered = signed.signature().to_vec();
    tampered[10] ^= 0xff;
    group.bench_function("tampered", |b| {
        b.iter(|| black_box(verify(black_box(&hash), black_box(&tampered), &from)))
    });

    group.finish();
}

/// Benchmark a full relay against the in-memory forwarder.
fn bench_relay(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let forwarder = Arc::new(MemoryForwarder::new(domain()));
    let settings = RelaySettings {
        gas_multiplier: 2,
        max_gas_limit: None,
        max_data_bytes: DEFAULT_MAX_DATA_BYTES,
        rpc_timeout: Duration::from_secs(2),
        receipt_timeout: Duration::from_secs(2),
    };
    let context = RelayContext::new(domain(), forwarder.clone(), settings)
        .with_clock(Arc::new(relay_core::clock::FixedClock::at(NOW)));
    let orchestrator = RelayOrchestrator::new(context);
    let signer = ForwardRequestSigner::new(PrivateKeySigner::random(), domain());

    c.bench_function("relay_memory", |b| {
        b.iter_batched(
            || {
                forwarder.set_nonce(signer.address(), U256::ZERO);
                signed(&signer, &rt, 0)
            },
            |request| black_box(rt.block_on(orchestrator.relay(request))),
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_digest, bench_verify, bench_relay);
criterion_main!(benches);
