/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Byte equality masks, dispatched to the best micro-architecture of the running machine.

use diskann_wide::arch::{dispatch2, dispatch_no_features, Scalar, Target, Target2};
#[cfg(target_arch = "x86_64")]
use diskann_wide::{
    arch::x86_64::{V3, V4},
    SIMDMask, SIMDPartialEq, SIMDVector,
};

use super::portable;

/// Bit `i` of the result is set when `a[i] == b[i]`.
#[inline]
pub(crate) fn eq_mask_16(a: &[u8; 16], b: &[u8; 16]) -> u32 {
    dispatch2(EqMask, a, b)
}

/// Bit `i` of the result is set when `a[i] == b[i]`.
#[inline]
pub(crate) fn eq_mask_32(a: &[u8; 32], b: &[u8; 32]) -> u32 {
    dispatch2(EqMask, a, b)
}

/// The number of differing bytes over pairs of 32-byte blocks.
///
/// Blocks beyond the shorter of the two slices are ignored.
#[inline]
pub(crate) fn mismatches_32(a: &[[u8; 32]], b: &[[u8; 32]]) -> u32 {
    dispatch2(Mismatches, a, b)
}

/// Return the name of the micro-architecture the kernels above run on.
pub(super) fn level() -> &'static str {
    dispatch_no_features(Level)
}

/// Lane-wise byte equality as a bit mask.
#[derive(Debug, Clone, Copy)]
struct EqMask;

/// Differing bytes over a run of 32-byte blocks.
#[derive(Debug, Clone, Copy)]
struct Mismatches;

/// The name of the dispatched micro-architecture.
#[derive(Debug, Clone, Copy)]
struct Level;

////////////
// Scalar //
////////////

impl Target2<Scalar, u32, &[u8; 16], &[u8; 16]> for EqMask {
    #[inline(always)]
    fn run(self, _: Scalar, a: &[u8; 16], b: &[u8; 16]) -> u32 {
        portable::eq_mask_16(a, b)
    }
}

impl Target2<Scalar, u32, &[u8; 32], &[u8; 32]> for EqMask {
    #[inline(always)]
    fn run(self, _: Scalar, a: &[u8; 32], b: &[u8; 32]) -> u32 {
        portable::eq_mask_32(a, b)
    }
}

impl Target2<Scalar, u32, &[[u8; 32]], &[[u8; 32]]> for Mismatches {
    #[inline(always)]
    fn run(self, _: Scalar, a: &[[u8; 32]], b: &[[u8; 32]]) -> u32 {
        std::iter::zip(a, b)
            .map(|(a, b)| 32 - portable::eq_mask_32(a, b).count_ones())
            .sum()
    }
}

impl Target<Scalar, &'static str> for Level {
    fn run(self, _: Scalar) -> &'static str {
        "scalar"
    }
}

////////////
// x86-64 //
////////////

#[cfg(target_arch = "x86_64")]
impl Target2<V3, u32, &[u8; 16], &[u8; 16]> for EqMask {
    #[inline(always)]
    fn run(self, arch: V3, a: &[u8; 16], b: &[u8; 16]) -> u32 {
        diskann_wide::alias!(u8s = <diskann_wide::arch::x86_64::V3>::u8x16);

        let eq = u8s::from_array(arch, *a).eq_simd(u8s::from_array(arch, *b));
        u32::from(eq.bitmask().0)
    }
}

#[cfg(target_arch = "x86_64")]
impl Target2<V3, u32, &[u8; 32], &[u8; 32]> for EqMask {
    #[inline(always)]
    fn run(self, arch: V3, a: &[u8; 32], b: &[u8; 32]) -> u32 {
        diskann_wide::alias!(u8s = <diskann_wide::arch::x86_64::V3>::u8x32);

        let eq = u8s::from_array(arch, *a).eq_simd(u8s::from_array(arch, *b));
        eq.bitmask().0
    }
}

#[cfg(target_arch = "x86_64")]
impl Target2<V3, u32, &[[u8; 32]], &[[u8; 32]]> for Mismatches {
    #[inline(always)]
    fn run(self, arch: V3, a: &[[u8; 32]], b: &[[u8; 32]]) -> u32 {
        std::iter::zip(a, b)
            .map(|(a, b)| 32 - EqMask.run(arch, a, b).count_ones())
            .sum()
    }
}

#[cfg(target_arch = "x86_64")]
impl Target<V3, &'static str> for Level {
    fn run(self, _: V3) -> &'static str {
        "x86-64-v3"
    }
}

// The 512-bit byte compares buy nothing at these widths, so V4 runs the V3 bodies.
#[cfg(target_arch = "x86_64")]
macro_rules! retarget {
    ($op:ty, $($T:ty),+ $(,)?) => {
        $(
            impl Target2<V4, u32, &$T, &$T> for $op {
                #[inline(always)]
                fn run(self, arch: V4, a: &$T, b: &$T) -> u32 {
                    self.run(arch.retarget(), a, b)
                }
            }
        )+
    };
}

#[cfg(target_arch = "x86_64")]
retarget!(EqMask, [u8; 16], [u8; 32]);

#[cfg(target_arch = "x86_64")]
retarget!(Mismatches, [[u8; 32]]);

#[cfg(target_arch = "x86_64")]
impl Target<V4, &'static str> for Level {
    fn run(self, _: V4) -> &'static str {
        "x86-64-v4"
    }
}

///////////
// Tests //
///////////
