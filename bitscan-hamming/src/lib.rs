/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */
//! # bitscan-hamming
//!
//! Distance computers for binary codes: vectors quantized to a fixed number of bits and
//! stored as byte sequences. A computer is built once from a reference code and then scores
//! many candidate codes against it, so the reference is unpacked into native words up front
//! and the scoring path for each width is a fixed, unrolled instruction sequence.
//!
//! # Computers
//!
//! Bitwise Hamming distance (number of differing bits):
//!
//! * [`HammingComputer4`], [`HammingComputer8`], [`HammingComputer16`],
//!   [`HammingComputer20`], [`HammingComputer32`] and [`HammingComputer64`] for the
//!   matching code lengths.
//! * [`HammingComputerDefault`] for any other length.
//!
//! Generalized Hamming distance (number of differing bytes):
//!
//! * [`GenHammingComputer8`], [`GenHammingComputer16`] and [`GenHammingComputer32`].
//! * [`GenHammingComputerM8`] for any multiple of 8 bytes.
//!
//! All computers implement [`HammingComputer`]. When the code length is only known at
//! runtime, [`dispatch_hamming`] and [`dispatch_gen_hamming`] select the best computer once
//! and hand it to a [`WithComputer`] visitor. The [`scan`] module builds batch scoring and
//! exact k-nearest-neighbor search over linear code buffers on top of that.
//!
//! # Hardware Paths
//!
//! Hot kernels have a portable body and vector bodies. The byte equality masks behind the
//! generalized computers are dispatched at run time through `diskann_wide`. The 64-byte
//! popcount block is chosen at compile time: build with `-C target-cpu=native` (or enable
//! `avx512f` and `avx512vpopcntdq`) to use it. Use [`backend`] to inspect the choice.
#![cfg_attr(
    not(test),
    warn(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::undocumented_unsafe_blocks
    )
)]

mod arch;
pub use arch::{backend, Backend};

mod error;
pub use error::{CodeSizeError, ScanError};

pub mod popcount;

mod computer;
pub use computer::{
    HammingComputer, HammingComputer16, HammingComputer20, HammingComputer32, HammingComputer4,
    HammingComputer64, HammingComputer8,
};

mod default;
pub use default::HammingComputerDefault;

mod generalized;
pub use generalized::{
    GenHammingComputer16, GenHammingComputer32, GenHammingComputer8, GenHammingComputerM8,
};

mod dispatch;
pub use dispatch::{dispatch_gen_hamming, dispatch_hamming, WithComputer};

pub mod scan;

/// Selector for the parallelization strategy used by the batch scoring functions.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum Parallelism {
    /// Use single-threaded execution.
    #[default]
    Sequential,

    /// Use Rayon based parallelism in the dynamically scoped Rayon thread pool.
    #[cfg(feature = "rayon")]
    Rayon,
}
