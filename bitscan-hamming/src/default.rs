/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use crate::{
    arch,
    computer::HammingComputer,
    popcount::{load_u64, prefix_dyn, BYTE_POPCOUNT},
    CodeSizeError,
};

/// Bitwise Hamming distance for codes of any length.
///
/// The reference code is borrowed rather than unpacked. Scoring proceeds in three stages:
///
/// 1. Whole 64-byte blocks go through the 512-bit kernel (vectorized when available,
///    otherwise eight unrolled word operations).
/// 2. The remaining 0 to 7 whole words are XOR-popcounted one word at a time.
/// 3. The final 0 to 7 bytes use a byte popcount lookup table.
///
/// Results are identical to the fixed-width computers for every width they support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HammingComputerDefault<'a> {
    code: &'a [u8],
    quotient8: usize,
    remainder8: usize,
}

impl HammingComputerDefault<'_> {
    /// Return the number of whole 64-bit words in the reference code.
    pub fn quotient8(&self) -> usize {
        self.quotient8
    }

    /// Return the number of trailing bytes after the last whole 64-bit word.
    pub fn remainder8(&self) -> usize {
        self.remainder8
    }
}

impl<'a> HammingComputer<'a> for HammingComputerDefault<'a> {
    /// Construct a computer for `code`. Every length is accepted.
    fn try_new(code: &'a [u8]) -> Result<Self, CodeSizeError> {
        Ok(Self {
            code,
            quotient8: code.len() / 8,
            remainder8: code.len() % 8,
        })
    }

    #[inline]
    fn hamming(&self, candidate: &[u8]) -> u32 {
        let candidate = prefix_dyn(candidate, self.code.len());
        let word_bytes = 8 * self.quotient8;

        let (a_words, a_tail) = self.code.split_at(word_bytes);
        let (b_words, b_tail) = candidate.split_at(word_bytes);

        // Stage 1: 64-byte blocks.
        let (a_blocks, a_residual) = a_words.as_chunks::<64>();
        let (b_blocks, b_residual) = b_words.as_chunks::<64>();
        let mut accu: u32 = std::iter::zip(a_blocks, b_blocks)
            .map(|(a, b)| arch::xor_popcount_512(a, b))
            .sum();

        // Stage 2: at most seven residual words.
        let (a_residual, _) = a_residual.as_chunks::<8>();
        let (b_residual, _) = b_residual.as_chunks::<8>();
        for (a, b) in std::iter::zip(a_residual, b_residual) {
            accu += (load_u64(a, 0) ^ load_u64(b, 0)).count_ones();
        }

        // Stage 3: at most seven residual bytes.
        debug_assert_eq!(a_tail.len(), self.remainder8);
        for (a, b) in std::iter::zip(a_tail, b_tail) {
            accu += BYTE_POPCOUNT[(a ^ b) as usize] as u32;
        }

        accu
    }

    fn code_size(&self) -> usize {
        self.code.len()
    }
}

///////////
// Tests //
///////////
