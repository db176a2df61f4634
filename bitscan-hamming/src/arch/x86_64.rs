/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The wide popcount. `diskann_wide` does not dispatch on `avx512vpopcntdq` yet, so this
//! body is compiled in only when the build enables the feature.

use std::arch::x86_64::*;

/// Sum of the popcounts of `a ^ b` over a 64-byte block.
///
/// One 512-bit XOR, one lane-wise 64-bit popcount and a horizontal reduction.
#[inline(always)]
pub(crate) fn xor_popcount_512(a: &[u8; 64], b: &[u8; 64]) -> u32 {
    // SAFETY: Both arguments are valid for 64 bytes of reads, the loads are unaligned, and
    // the required target features are enabled for the whole compilation unit.
    unsafe {
        let vxor = _mm512_xor_si512(
            _mm512_loadu_si512(a.as_ptr().cast()),
            _mm512_loadu_si512(b.as_ptr().cast()),
        );
        let vpcnt = _mm512_popcnt_epi64(vxor);
        _mm512_reduce_add_epi64(vpcnt) as u32
    }
}
