/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The fused bias-add + top-k selection kernel.
//!
//! For every row `q` of an `nrows x ncols` distance matrix `D` and a bias vector `b` of
//! length `ncols`, the kernel selects the `k` smallest values of `D[q][c] + b[c]` in
//! ascending order, breaking ties by the lower column `c`. The biased matrix is never
//! materialized.
//!
//! # Execution Model
//!
//! ```text
//!   row q:  | lane 0        | lane 1        | ... | lane L-1      |
//!           | tile | tile | | tile | tile | |     | tile | tile | |
//!                  |               |                     |
//!              heap (k)        heap (k)              heap (k)
//!                   \             /                     |
//!                    merge (k) ---        ...           |
//!                           \                          /
//!                            ------- merge (k) --------
//!                                        |
//!                                   top-k of row q
//! ```
//!
//! * Rows are grouped into execution groups of [`LaunchConfig::rows_per_group`] rows, and
//!   groups are scheduled on the current Rayon thread pool. Each output row is written by
//!   exactly one group.
//! * Inside a group, each row is split into at most [`LaunchConfig::lanes`] contiguous
//!   column slices processed in parallel. Every lane stages its slice
//!   [`LaunchConfig::tile`] columns at a time, adds the bias, and feeds a bounded max-heap
//!   holding at most `k` candidates.
//! * Sorted lane results are merged pairwise, one tree level at a time, with every merge
//!   truncated to `k` entries. The merges of a level run in parallel and a level begins
//!   only once the previous one has completed.
//!
//! Scratch space per group is `O(lanes * (tile + k))` and is allocated fallibly.

use rayon::prelude::*;

use crate::{
    candidate::Candidate, config::LaunchConfig, heap::BoundedHeap, matrix::MatrixView,
    SelectError,
};

//////////
// TopK //
//////////

/// The result of a selection: for every row, `k` distances in ascending order and the
/// columns they came from.
#[derive(Debug, Clone)]
pub struct TopK {
    distances: Box<[f32]>,
    indices: Box<[u32]>,
    nrows: usize,
    k: usize,
}

impl TopK {
    /// Return the number of rows.
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Return the number of entries selected per row.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Return all selected distances as a row-major `nrows x k` slice.
    pub fn distances(&self) -> &[f32] {
        &self.distances
    }

    /// Return all selected column indices as a row-major `nrows x k` slice.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Return the distances and indices selected for `row`, or `None` if `row` is out of
    /// bounds.
    pub fn row(&self, row: usize) -> Option<(&[f32], &[u32])> {
        if row >= self.nrows {
            return None;
        }
        let range = row * self.k..(row + 1) * self.k;
        Some((
            self.distances.get(range.clone())?,
            self.indices.get(range)?,
        ))
    }

    /// Consume the result and return the distance and index buffers.
    pub fn into_parts(self) -> (Box<[f32]>, Box<[u32]>) {
        (self.distances, self.indices)
    }
}

////////////
// Kernel //
////////////

/// Check the arguments of a selection over a matrix with `ncols` columns.
///
/// # Errors
///
/// Returns [`SelectError::InvalidArgument`] if
///
/// * `k` is zero,
/// * `k` exceeds `ncols`,
/// * `bias_len` differs from `ncols`, or
/// * some column index cannot be represented as a `u32`.
pub fn check_arguments(ncols: usize, bias_len: usize, k: usize) -> Result<(), SelectError> {
    if k == 0 {
        return Err(SelectError::invalid_argument("k must be at least 1"));
    }
    if k > ncols {
        return Err(SelectError::invalid_argument(format!(
            "k ({k}) exceeds the number of candidates ({ncols})"
        )));
    }
    if bias_len != ncols {
        return Err(SelectError::invalid_argument(format!(
            "bias has {bias_len} entries but the distance matrix has {ncols} columns"
        )));
    }
    if u32::try_from(ncols - 1).is_err() {
        return Err(SelectError::invalid_argument(format!(
            "the number of candidates ({ncols}) exceeds the range of u32 column indices"
        )));
    }
    Ok(())
}

/// Select the `k` smallest values of `distances[q][c] + bias[c]` for every row `q`.
///
/// The kernel runs on the Rayon thread pool of the caller. Results do not depend on the
/// launch geometry in `config` or on the number of threads.
///
/// # Errors
///
/// * [`SelectError::InvalidArgument`] for the conditions listed in [`check_arguments`].
/// * [`SelectError::OutOfMemory`] if the result or scratch space cannot be allocated.
pub fn fused_bias_topk(
    distances: MatrixView<'_, f32>,
    bias: &[f32],
    k: usize,
    config: &LaunchConfig,
) -> Result<TopK, SelectError> {
    let (nrows, ncols) = (distances.nrows(), distances.ncols());
    check_arguments(ncols, bias.len(), k)?;

    let geometry = Geometry::new(ncols, k, config);
    tracing::debug!(
        nrows,
        ncols,
        k,
        lanes = geometry.lanes,
        lane_len = geometry.lane_len,
        tile = geometry.tile,
        "fused bias top-k launch"
    );

    let len = nrows
        .checked_mul(k)
        .ok_or(SelectError::OutOfMemory { bytes: usize::MAX })?;
    let mut out_distances = try_alloc(len, 0.0f32)?;
    let mut out_indices = try_alloc(len, 0u32)?;

    if nrows != 0 {
        let rows_per_group = config.rows_per_group().get().min(nrows);
        distances
            .as_slice()
            .par_chunks(rows_per_group * ncols)
            .zip(out_distances.par_chunks_mut(rows_per_group * k))
            .zip(out_indices.par_chunks_mut(rows_per_group * k))
            .try_for_each(|((rows, group_distances), group_indices)| {
                let mut scratch = Scratch::try_new(&geometry)?;
                let outputs = group_distances
                    .chunks_exact_mut(k)
                    .zip(group_indices.chunks_exact_mut(k));
                for (row, (out_d, out_i)) in rows.chunks_exact(ncols).zip(outputs) {
                    select_row(row, bias, k, &geometry, &mut scratch, out_d, out_i)?;
                }
                Ok::<(), SelectError>(())
            })?;
    }

    Ok(TopK {
        distances: out_distances.into_boxed_slice(),
        indices: out_indices.into_boxed_slice(),
        nrows,
        k,
    })
}

/////////////
// Helpers //
/////////////

/// Partitioning of a row into lanes.
#[derive(Debug, Clone, Copy)]
struct Geometry {
    /// The number of non-empty lanes.
    lanes: usize,
    /// Columns per lane. The last lane may be shorter.
    lane_len: usize,
    /// Columns staged at a time within a lane.
    tile: usize,
    /// Heap capacity of each lane.
    capacity: usize,
}

impl Geometry {
    /// Requires `1 <= k <= ncols`.
    fn new(ncols: usize, k: usize, config: &LaunchConfig) -> Self {
        let lane_len = ncols.div_ceil(config.lanes().get().min(ncols));
        Self {
            lanes: ncols.div_ceil(lane_len),
            lane_len,
            tile: config.tile().get().min(lane_len),
            capacity: k.min(lane_len),
        }
    }
}

/// Per-group working memory.
struct Scratch {
    /// One tile of staging space per lane.
    staging: Vec<f32>,
    front: Vec<Candidate>,
    back: Vec<Candidate>,
    /// Retained length of each sorted run. Run `i` of a merge level where every run spans
    /// `w` lanes starts at slot `i * w * capacity`.
    runs: Vec<usize>,
    next_runs: Vec<usize>,
}

impl Scratch {
    fn try_new(geometry: &Geometry) -> Result<Self, SelectError> {
        let slots = geometry.lanes * geometry.capacity;
        let empty = Candidate::new(0.0, 0);
        Ok(Self {
            staging: try_alloc(geometry.lanes * geometry.tile, 0.0)?,
            front: try_alloc(slots, empty)?,
            back: try_alloc(slots, empty)?,
            runs: try_with_capacity(geometry.lanes)?,
            next_runs: try_with_capacity(geometry.lanes.div_ceil(2))?,
        })
    }
}

/// Select the top `k` of a single row into `out_distances` and `out_indices`.
///
/// Lanes run in parallel on the current Rayon thread pool, and so do the merges within
/// each level of the merge tree. A level starts only after the previous one has finished.
fn select_row(
    row: &[f32],
    bias: &[f32],
    k: usize,
    geometry: &Geometry,
    scratch: &mut Scratch,
    out_distances: &mut [f32],
    out_indices: &mut [u32],
) -> Result<(), SelectError> {
    let Geometry {
        lanes,
        lane_len,
        tile,
        capacity,
    } = *geometry;

    // Lane phase: every lane streams its columns through its staging tile into a heap.
    // Capacity for `lanes` entries was reserved up front, so this does not allocate.
    scratch.runs.clear();
    scratch.runs.resize(lanes, 0);
    row.par_chunks(lane_len)
        .zip(bias.par_chunks(lane_len))
        .zip(scratch.front.par_chunks_mut(capacity))
        .zip(scratch.staging.par_chunks_mut(tile))
        .zip(scratch.runs.par_iter_mut())
        .enumerate()
        .for_each(|(lane, ((((values, lane_bias), storage), staging), retained))| {
            #[cfg(test)]
            tests::record_lane_thread();

            let mut heap = BoundedHeap::new(storage);
            let mut column = lane * lane_len;
            for (values, lane_bias) in values.chunks(tile).zip(lane_bias.chunks(tile)) {
                let staging = &mut staging[..values.len()];
                for ((s, v), b) in staging.iter_mut().zip(values).zip(lane_bias) {
                    *s = v + b;
                }
                for s in staging.iter() {
                    // `check_arguments` ensures every column index fits in a `u32`.
                    heap.push(Candidate::new(*s, column as u32));
                    column += 1;
                }
            }
            *retained = heap.into_sorted().len();
        });

    // Merge phase: combine sorted runs pairwise until one remains. Each level is a single
    // parallel pass over disjoint pairs of runs.
    let mut src: &mut [Candidate] = &mut scratch.front;
    let mut dst: &mut [Candidate] = &mut scratch.back;
    let mut runs = &mut scratch.runs;
    let mut next_runs = &mut scratch.next_runs;
    let mut span = capacity;
    while runs.len() > 1 {
        next_runs.clear();
        next_runs.resize(runs.len().div_ceil(2), 0);
        src.par_chunks(2 * span)
            .zip(dst.par_chunks_mut(2 * span))
            .zip(runs.par_chunks(2))
            .zip(next_runs.par_iter_mut())
            .for_each(|(((src, dst), pair), merged)| {
                *merged = match *pair {
                    [la, lb] => {
                        let len = (la + lb).min(k);
                        merge_into(&src[..la], &src[span..span + lb], &mut dst[..len])
                    }
                    [len] => {
                        dst[..len].copy_from_slice(&src[..len]);
                        len
                    }
                    _ => 0,
                };
            });
        std::mem::swap(&mut src, &mut dst);
        std::mem::swap(&mut runs, &mut next_runs);
        span *= 2;
    }

    let selected = match runs.first() {
        Some(&len) if len == k => &src[..len],
        _ => {
            return Err(SelectError::LaunchFailed(format!(
                "selection produced {:?} entries for k = {k}",
                runs.first()
            )));
        }
    };

    for ((d, i), c) in out_distances
        .iter_mut()
        .zip(out_indices.iter_mut())
        .zip(selected)
    {
        *d = c.distance();
        *i = c.index();
    }
    Ok(())
}

/// Merge the sorted runs `a` and `b` into `out`, stopping when `out` is full or both runs
/// are exhausted. Returns the number of candidates written.
fn merge_into(a: &[Candidate], b: &[Candidate], out: &mut [Candidate]) -> usize {
    let (mut i, mut j) = (0, 0);
    let mut written = 0;
    for slot in out.iter_mut() {
        let next = match (a.get(i), b.get(j)) {
            (Some(x), Some(y)) => {
                if y < x {
                    j += 1;
                    *y
                } else {
                    i += 1;
                    *x
                }
            }
            (Some(x), None) => {
                i += 1;
                *x
            }
            (None, Some(y)) => {
                j += 1;
                *y
            }
            (None, None) => break,
        };
        *slot = next;
        written += 1;
    }
    written
}

fn try_alloc<T: Clone>(len: usize, value: T) -> Result<Vec<T>, SelectError> {
    let mut buffer = try_with_capacity(len)?;
    buffer.resize(len, value);
    Ok(buffer)
}

fn try_with_capacity<T>(len: usize) -> Result<Vec<T>, SelectError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| SelectError::OutOfMemory {
            bytes: len.saturating_mul(std::mem::size_of::<T>()),
        })?;
    Ok(buffer)
}

///////////
// Tests //
///////////
