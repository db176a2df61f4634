/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::time::Duration;

use bitscan_hamming::{
    dispatch_gen_hamming, dispatch_hamming, scan, HammingComputer, HammingComputerDefault,
    Parallelism, WithComputer,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{distr::StandardUniform, rngs::StdRng, Rng, SeedableRng};

const NUM_CODES: usize = 4096;

fn random_codes(seed: u64, len: usize) -> Box<[u8]> {
    StdRng::seed_from_u64(seed)
        .sample_iter(StandardUniform)
        .take(len)
        .collect()
}

/// Sum the distances between the reference and every code in the buffer.
struct SumAll<'b> {
    codes: &'b [u8],
}

impl WithComputer for SumAll<'_> {
    type Output = u64;

    fn apply<'a, C>(self, computer: C) -> u64
    where
        C: HammingComputer<'a>,
    {
        self.codes
            .chunks_exact(computer.code_size())
            .map(|c| computer.hamming(black_box(c)) as u64)
            .sum()
    }
}

fn benchmark_computers(c: &mut Criterion) {
    let mut group = c.benchmark_group("hamming");
    group.throughput(Throughput::Elements(NUM_CODES as u64));

    for code_size in [4, 8, 16, 20, 32, 64, 128] {
        let query = random_codes(code_size as u64, code_size);
        let codes = random_codes(0xc0de, code_size * NUM_CODES);

        group.bench_with_input(BenchmarkId::new("specialized", code_size), &codes, |b, codes| {
            b.iter(|| dispatch_hamming(&query, SumAll { codes }))
        });

        group.bench_with_input(BenchmarkId::new("default", code_size), &codes, |b, codes| {
            b.iter(|| SumAll { codes }.apply(HammingComputerDefault::new(&query)))
        });
    }
    group.finish();
}

fn benchmark_generalized(c: &mut Criterion) {
    let mut group = c.benchmark_group("generalized-hamming");
    group.throughput(Throughput::Elements(NUM_CODES as u64));

    for code_size in [8, 16, 32, 64, 256] {
        let query = random_codes(code_size as u64, code_size);
        let codes = random_codes(0xc0de, code_size * NUM_CODES);

        group.bench_with_input(BenchmarkId::from_parameter(code_size), &codes, |b, codes| {
            b.iter(|| dispatch_gen_hamming(&query, SumAll { codes }))
        });
    }
    group.finish();
}

fn benchmark_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");
    let code_size = 32;
    let num_codes = 1 << 16;
    let query = random_codes(7, code_size);
    let codes = random_codes(11, code_size * num_codes);
    let mut out = vec![0u32; num_codes];

    group.throughput(Throughput::Elements(num_codes as u64));
    group.bench_function("distances", |b| {
        b.iter(|| scan::hamming_distances(&query, &codes, &mut out, Parallelism::Sequential))
    });
    group.bench_function("knn-10", |b| {
        b.iter(|| scan::hamming_knn(&query, &codes, 10, Parallelism::Sequential))
    });
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default()
        .warm_up_time(Duration::from_secs(1))
        .measurement_time(Duration::from_secs(3));
    targets =
        benchmark_computers,
        benchmark_generalized,
        benchmark_scan,
);
criterion_main!(benches);
