/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use std::time::{Duration, Instant};

use anyhow::Context;
use bitscan_hamming::{scan, Parallelism};
use bitscan_select::{select, Device, DeviceMatrix, DeviceVector};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::Serialize;

use crate::utils::{Distance, HammingRun, Run, RunFile, SelectRun};

/// Latency statistics over the measurements of one run, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub min: u64,
    pub median: u64,
    pub mean: f64,
    pub max: u64,
}

impl Summary {
    fn new(latencies: &[u64]) -> Option<Self> {
        let mut sorted = latencies.to_vec();
        sorted.sort_unstable();
        let len = sorted.len();
        Some(Self {
            min: *sorted.first()?,
            median: sorted[len / 2],
            mean: sorted.iter().sum::<u64>() as f64 / len as f64,
            max: *sorted.last()?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub run: Run,
    /// Latency of each measurement in microseconds.
    pub latencies: Vec<u64>,
    pub summary: Summary,
    /// A digest of the output of the final measurement. Identical inputs and seeds produce
    /// identical checksums.
    pub checksum: u64,
}

/// Execute every run in `file`.
///
/// Each run draws its inputs from a generator seeded by `seed` and the position of the run,
/// so results do not depend on which other runs are present.
pub fn run_all(file: &RunFile, seed: u64) -> anyhow::Result<Vec<RunResult>> {
    file.runs
        .iter()
        .enumerate()
        .map(|(i, run)| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
            let result = run_one(run, &mut rng)?;
            tracing::info!(
                run = %run,
                min_us = result.summary.min,
                median_us = result.summary.median,
                mean_us = result.summary.mean,
                checksum = result.checksum,
                "run {} complete",
                i
            );
            Ok(result)
        })
        .collect()
}

/// Execute a single run.
pub fn run_one(run: &Run, rng: &mut StdRng) -> anyhow::Result<RunResult> {
    run.check()?;
    let (latencies, checksum) = match run {
        Run::Hamming(hamming) => run_hamming(hamming, rng)?,
        Run::Select(selection) => run_select(selection, rng)?,
    };

    let latencies: Vec<u64> = latencies
        .iter()
        .map(|l| l.as_micros().try_into().unwrap_or(u64::MAX))
        .collect();
    let summary = Summary::new(&latencies)
        .ok_or_else(|| anyhow::anyhow!("run produced no measurements"))?;

    Ok(RunResult {
        run: run.clone(),
        latencies,
        summary,
        checksum,
    })
}

fn measure<F>(num_measurements: usize, mut f: F) -> anyhow::Result<(Vec<Duration>, u64)>
where
    F: FnMut() -> anyhow::Result<u64>,
{
    let mut latencies = Vec::with_capacity(num_measurements);
    let mut checksum = 0;
    for _ in 0..num_measurements {
        let start = Instant::now();
        checksum = f()?;
        latencies.push(start.elapsed());
    }
    Ok((latencies, checksum))
}

fn run_hamming(run: &HammingRun, rng: &mut StdRng) -> anyhow::Result<(Vec<Duration>, u64)> {
    let code_size = run.code_size.get();
    let num_codes = run.num_codes.get();

    let len = code_size.checked_mul(num_codes).with_context(|| {
        format!("{num_codes} codes of {code_size} bytes overflow the address space")
    })?;

    let query: Vec<u8> = (0..code_size).map(|_| rng.random()).collect();
    let codes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    let parallelism = if run.parallel {
        Parallelism::Rayon
    } else {
        Parallelism::Sequential
    };

    tracing::debug!(code_size, num_codes, ?parallelism, "starting hamming run");
    let mut out = vec![0u32; num_codes];
    measure(run.num_measurements.get(), || {
        let checksum = match (run.distance, run.k) {
            (Distance::Bitwise, None) => {
                scan::hamming_distances(&query, &codes, &mut out, parallelism)?;
                out.iter().map(|&d| u64::from(d)).sum()
            }
            (Distance::Generalized, None) => {
                scan::generalized_hamming_distances(&query, &codes, &mut out, parallelism)?;
                out.iter().map(|&d| u64::from(d)).sum()
            }
            (Distance::Bitwise, Some(k)) => scan::hamming_knn(&query, &codes, k.get(), parallelism)?
                .iter()
                .map(|n| u64::from(n.distance) + n.id as u64)
                .sum(),
            (Distance::Generalized, Some(_)) => {
                anyhow::bail!("nearest neighbor search requires the bitwise distance")
            }
        };
        Ok(checksum)
    })
}

fn run_select(run: &SelectRun, rng: &mut StdRng) -> anyhow::Result<(Vec<Duration>, u64)> {
    let (rows, cols, k) = (run.rows.get(), run.cols.get(), run.k.get());
    let normal =
        Normal::new(0.0f32, 1.0).map_err(|err| anyhow::anyhow!("invalid distribution: {err:?}"))?;

    let len = rows
        .checked_mul(cols)
        .with_context(|| format!("a {rows} x {cols} matrix overflows the address space"))?;

    let data: Vec<f32> = (0..len).map(|_| normal.sample(rng)).collect();
    let bias: Vec<f32> = (0..cols).map(|_| normal.sample(rng).abs()).collect();
    let distances = DeviceMatrix::try_from(data, rows, cols)?;
    let bias = DeviceVector::new(bias);

    let device = Device::new(run.device)?;
    let stream = device.stream()?;
    tracing::debug!(rows, cols, k, num_threads = device.num_threads(), "starting select run");

    measure(run.num_measurements.get(), || {
        let pending = select(&stream, &distances, &bias, k)?;
        stream.synchronize()?;
        let topk = pending.wait()?;
        Ok(topk.indices().iter().map(|&i| u64::from(i)).sum())
    })
}

///////////
// Tests //
///////////
