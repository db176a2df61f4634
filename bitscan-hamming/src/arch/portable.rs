/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use crate::popcount::{unpack, xor_popcount};

/// Sum of the popcounts of `a ^ b` over a 64-byte block, as eight unrolled word steps.
// Builds with the wide popcount only use this as the reference in tests.
#[cfg_attr(
    all(target_feature = "avx512f", target_feature = "avx512vpopcntdq"),
    allow(dead_code)
)]
#[inline(always)]
pub(crate) fn xor_popcount_512(a: &[u8; 64], b: &[u8; 64]) -> u32 {
    let a: [u64; 8] = unpack(a);
    xor_popcount(&a, b)
}

/// Bit `i` of the result is set when `a[i] == b[i]`.
#[inline(always)]
pub(crate) fn eq_mask_16(a: &[u8; 16], b: &[u8; 16]) -> u32 {
    eq_mask(a, b)
}

/// Bit `i` of the result is set when `a[i] == b[i]`.
#[inline(always)]
pub(crate) fn eq_mask_32(a: &[u8; 32], b: &[u8; 32]) -> u32 {
    eq_mask(a, b)
}

#[inline(always)]
fn eq_mask<const N: usize>(a: &[u8; N], b: &[u8; N]) -> u32 {
    const { assert!(N <= 32, "lane mask must fit in a u32") };
    let mut mask = 0u32;
    for i in 0..N {
        mask |= ((a[i] == b[i]) as u32) << i;
    }
    mask
}
