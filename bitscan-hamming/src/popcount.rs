/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Population-count primitives shared by every computer in the crate.
//!
//! The free functions [`hamming`] and [`generalized_hamming`] are unoptimized, byte-at-a-time
//! implementations. They accept codes of any (equal) length and serve as the ground truth
//! the specialized computers are tested against.

use crate::CodeSizeError;

/// Number of set bits for every possible byte value.
pub const BYTE_POPCOUNT: [u8; 256] = byte_popcount_table();

const fn byte_popcount_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = (i as u8).count_ones() as u8;
        i += 1;
    }
    table
}

/// Mask selecting the lowest bit of every byte in a `u64`.
const LOW_BIT_PER_BYTE: u64 = 0x0101_0101_0101_0101;

/// Return the number of non-zero bytes in `x`.
///
/// Each byte is OR-smeared into its lowest bit with three shift-or steps; the low bits are
/// then isolated and counted. Applied to `a ^ b`, this counts the bytes where `a` and `b`
/// differ.
#[inline(always)]
pub fn generalized_hamming_64(mut x: u64) -> u32 {
    x |= x >> 1;
    x |= x >> 2;
    x |= x >> 4;
    x &= LOW_BIT_PER_BYTE;
    x.count_ones()
}

/// Compute the bitwise Hamming distance between `x` and `y` one byte at a time.
///
/// Returns an error if the arguments have different lengths.
pub fn hamming(x: &[u8], y: &[u8]) -> Result<u32, CodeSizeError> {
    check_lengths(x, y)?;
    Ok(std::iter::zip(x, y)
        .map(|(a, b)| BYTE_POPCOUNT[(a ^ b) as usize] as u32)
        .sum())
}

/// Compute the number of byte positions at which `x` and `y` differ.
///
/// Returns an error if the arguments have different lengths.
pub fn generalized_hamming(x: &[u8], y: &[u8]) -> Result<u32, CodeSizeError> {
    check_lengths(x, y)?;
    Ok(std::iter::zip(x, y).filter(|(a, b)| a != b).count() as u32)
}

fn check_lengths(x: &[u8], y: &[u8]) -> Result<(), CodeSizeError> {
    if x.len() == y.len() {
        Ok(())
    } else {
        Err(CodeSizeError::Mismatch {
            expected: x.len(),
            actual: y.len(),
        })
    }
}

//////////////////////
// Internal Helpers //
//////////////////////

/// Load the 8 bytes beginning at `offset` as a native-endian `u64`.
///
/// When `bytes` has a length known at compile time (e.g. it came from an `&[u8; N]`) the
/// bounds check folds away after inlining.
#[inline(always)]
pub(crate) fn load_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_ne_bytes(word)
}

/// Load the 4 bytes beginning at `offset` as a native-endian `u32`.
#[inline(always)]
pub(crate) fn load_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_ne_bytes(word)
}

/// Unpack an `8 * W` byte code into `W` native words.
#[inline(always)]
pub(crate) fn unpack<const W: usize, const B: usize>(bytes: &[u8; B]) -> [u64; W] {
    const { assert!(B == 8 * W, "byte count must be eight times the word count") };
    std::array::from_fn(|i| load_u64(bytes, 8 * i))
}

/// XOR each stored word against the corresponding word of `b` and sum the popcounts.
///
/// Both `W` and `B` are compile-time constants so the loop is fully unrolled.
#[inline(always)]
pub(crate) fn xor_popcount<const W: usize, const B: usize>(a: &[u64; W], b: &[u8; B]) -> u32 {
    const { assert!(B == 8 * W, "byte count must be eight times the word count") };
    let mut s = 0;
    for (i, x) in a.iter().enumerate() {
        s += (x ^ load_u64(b, 8 * i)).count_ones();
    }
    s
}

/// View `code` as exactly `N` bytes, failing if its length is anything else.
#[inline]
pub(crate) fn exact<const N: usize>(code: &[u8]) -> Result<&[u8; N], CodeSizeError> {
    code.try_into().map_err(|_| CodeSizeError::Mismatch {
        expected: N,
        actual: code.len(),
    })
}

/// Return the first `N` bytes of a candidate code.
///
/// Candidates shorter than `N` bytes are a caller contract violation and panic; longer
/// candidates are accepted and only their prefix is read.
#[inline(always)]
pub(crate) fn prefix<const N: usize>(code: &[u8]) -> &[u8; N] {
    match code.first_chunk::<N>() {
        Some(chunk) => chunk,
        None => CodeSizeError::Mismatch {
            expected: N,
            actual: code.len(),
        }
        .panic(),
    }
}

/// Return the first `len` bytes of a candidate code, panicking if it is too short.
#[inline(always)]
pub(crate) fn prefix_dyn(code: &[u8], len: usize) -> &[u8] {
    match code.get(..len) {
        Some(head) => head,
        None => CodeSizeError::Mismatch {
            expected: len,
            actual: code.len(),
        }
        .panic(),
    }
}

///////////
// Tests //
///////////
