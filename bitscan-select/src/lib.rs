/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */
//! # bitscan-select
//!
//! Fused bias-add + top-k selection over dense distance matrices.
//!
//! Dense distance scans commonly split a distance into a query-dependent term computed by a
//! matrix product and a per-candidate bias (for example, a squared centroid norm). This
//! crate adds the bias and selects the `k` best candidates of every query row in a single
//! pass, without materializing the biased matrix.
//!
//! # Execution
//!
//! * [`fused_bias_topk`] runs the kernel synchronously on the current Rayon thread pool.
//! * A [`Device`] owns a dedicated thread pool. [`select`] enqueues the kernel on a
//!   [`Stream`] of that device and returns a [`Pending`] result; the host observes
//!   completion with [`Stream::synchronize`] or [`Pending::wait`].
//!
//! Argument errors are returned when a launch is requested. Execution errors are reported
//! when the host synchronizes.
//!
//! # Ordering
//!
//! Every row of the result holds the `k` smallest biased distances in ascending order,
//! with ties broken by the lower column. `-0.0` is reported as `+0.0`, and NaN sorts after
//! every other value. Results are independent of the [`LaunchConfig`] and of the number of
//! worker threads.
#![cfg_attr(
    not(test),
    warn(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::undocumented_unsafe_blocks
    )
)]

mod candidate;
mod heap;

pub mod config;
pub use config::{ConfigError, DeviceConfig, LaunchConfig};

mod error;
pub use error::SelectError;

mod matrix;
pub use matrix::{DeviceMatrix, DeviceVector, MatrixView, TryFromError};

mod kernel;
pub use kernel::{check_arguments, fused_bias_topk, TopK};

mod device;
pub use device::{select, Device, Pending, Stream};
