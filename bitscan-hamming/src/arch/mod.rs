/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Selection of the block kernels used by the computers.
//!
//! | Kernel             | Portable            | Vector body                         | Selected    |
//! |--------------------|---------------------|-------------------------------------|-------------|
//! | `xor_popcount_512` | 8 unrolled `u64`s   | `avx512f` + `avx512vpopcntdq`       | compile time |
//! | `eq_mask_16`       | byte compare loop   | `diskann_wide` `u8x16` on V3 and V4 | run time    |
//! | `eq_mask_32`       | byte compare loop   | `diskann_wide` `u8x32` on V3 and V4 | run time    |
//! | `mismatches_32`    | byte compare loop   | `diskann_wide` `u8x32` on V3 and V4 | run time    |
//!
//! The equality masks go through [`diskann_wide::arch::dispatch2`], which resolves the
//! micro-architecture of the running machine once and applies its target features to the
//! kernel body. `diskann_wide` does not yet gate on `avx512vpopcntdq`, so the wide popcount
//! is still selected by `cfg_if!` over the target features of the build.
//!
//! All bodies of a kernel return identical results for every input.

mod masks;
pub(crate) mod portable;

#[cfg(all(
    target_arch = "x86_64",
    target_feature = "avx512f",
    target_feature = "avx512vpopcntdq"
))]
mod x86_64;

pub(crate) use masks::{eq_mask_16, eq_mask_32, mismatches_32};

cfg_if::cfg_if! {
    if #[cfg(all(
        target_arch = "x86_64",
        target_feature = "avx512f",
        target_feature = "avx512vpopcntdq"
    ))] {
        pub(crate) use x86_64::xor_popcount_512;
        const XOR_POPCOUNT_512: &str = "avx512-vpopcntdq";
    } else {
        pub(crate) use portable::xor_popcount_512;
        const XOR_POPCOUNT_512: &str = "scalar";
    }
}

/// The kernel bodies used on this machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backend {
    /// Implementation of the 64-byte XOR + popcount block. Fixed when the crate is built.
    pub xor_popcount_512: &'static str,
    /// Micro-architecture running the byte equality masks. Resolved when first needed.
    pub eq_mask: &'static str,
}

impl Backend {
    /// Return whether 64-byte blocks use the vectorized popcount.
    pub fn has_wide_popcount(&self) -> bool {
        self.xor_popcount_512 != "scalar"
    }

    /// Return whether the byte equality masks run on a vector body.
    pub fn has_vector_eq_mask(&self) -> bool {
        self.eq_mask != "scalar"
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "xor-popcount-512: {}, eq-mask: {}",
            self.xor_popcount_512, self.eq_mask
        )
    }
}

/// Return the kernel bodies used on this machine.
pub fn backend() -> Backend {
    Backend {
        xor_popcount_512: XOR_POPCOUNT_512,
        eq_mask: masks::level(),
    }
}

///////////
// Tests //
///////////
