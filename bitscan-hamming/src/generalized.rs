/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Generalized Hamming distance: the number of byte positions at which two codes differ.
//!
//! Two strategies are used, and they agree for every input:
//!
//! * Bit-smear: XOR two words, fold every byte onto its lowest bit and count the low bits
//!   (see [`generalized_hamming_64`]). Used for 8-byte codes and the word tail of
//!   [`GenHammingComputerM8`].
//! * Compare-and-mask: compare a block byte by byte into one bit per equal lane, then
//!   subtract the popcount of that mask from the lane count. Used for 16 and 32-byte blocks.

use crate::{
    arch,
    computer::HammingComputer,
    popcount::{exact, generalized_hamming_64, load_u64, prefix, prefix_dyn},
    CodeSizeError,
};

/// Generalized Hamming distance for 8-byte codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenHammingComputer8 {
    a0: u64,
}

impl GenHammingComputer8 {
    /// The code length accepted by this computer.
    pub const CODE_SIZE: usize = 8;
}

impl<'a> HammingComputer<'a> for GenHammingComputer8 {
    fn try_new(code: &'a [u8]) -> Result<Self, CodeSizeError> {
        let code = exact::<{ GenHammingComputer8::CODE_SIZE }>(code)?;
        Ok(Self {
            a0: load_u64(code, 0),
        })
    }

    #[inline(always)]
    fn hamming(&self, candidate: &[u8]) -> u32 {
        let b = prefix::<{ GenHammingComputer8::CODE_SIZE }>(candidate);
        generalized_hamming_64(self.a0 ^ load_u64(b, 0))
    }

    fn code_size(&self) -> usize {
        Self::CODE_SIZE
    }
}

/// Generalized Hamming distance for 16-byte codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenHammingComputer16 {
    a: [u8; 16],
}

impl GenHammingComputer16 {
    /// The code length accepted by this computer.
    pub const CODE_SIZE: usize = 16;
}

impl<'a> HammingComputer<'a> for GenHammingComputer16 {
    fn try_new(code: &'a [u8]) -> Result<Self, CodeSizeError> {
        let a = *exact::<{ GenHammingComputer16::CODE_SIZE }>(code)?;
        Ok(Self { a })
    }

    #[inline(always)]
    fn hamming(&self, candidate: &[u8]) -> u32 {
        let b = prefix::<{ GenHammingComputer16::CODE_SIZE }>(candidate);
        16 - arch::eq_mask_16(&self.a, b).count_ones()
    }

    fn code_size(&self) -> usize {
        Self::CODE_SIZE
    }
}

/// Generalized Hamming distance for 32-byte codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenHammingComputer32 {
    a: [u8; 32],
}

impl GenHammingComputer32 {
    /// The code length accepted by this computer.
    pub const CODE_SIZE: usize = 32;
}

impl<'a> HammingComputer<'a> for GenHammingComputer32 {
    fn try_new(code: &'a [u8]) -> Result<Self, CodeSizeError> {
        let a = *exact::<{ GenHammingComputer32::CODE_SIZE }>(code)?;
        Ok(Self { a })
    }

    #[inline(always)]
    fn hamming(&self, candidate: &[u8]) -> u32 {
        let b = prefix::<{ GenHammingComputer32::CODE_SIZE }>(candidate);
        32 - arch::eq_mask_32(&self.a, b).count_ones()
    }

    fn code_size(&self) -> usize {
        Self::CODE_SIZE
    }
}

/// Generalized Hamming distance for codes whose length is any multiple of 8 bytes.
///
/// Whole 32-byte blocks use compare-and-mask. The remaining 0 to 3 words use bit-smear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenHammingComputerM8<'a> {
    code: &'a [u8],
}

impl<'a> HammingComputer<'a> for GenHammingComputerM8<'a> {
    /// Construct a computer for `code`.
    ///
    /// Returns [`CodeSizeError::NotMultiple`] if the length of `code` is not a multiple of 8.
    fn try_new(code: &'a [u8]) -> Result<Self, CodeSizeError> {
        if !code.len().is_multiple_of(8) {
            return Err(CodeSizeError::NotMultiple {
                multiple_of: 8,
                actual: code.len(),
            });
        }
        Ok(Self { code })
    }

    #[inline]
    fn hamming(&self, candidate: &[u8]) -> u32 {
        let candidate = prefix_dyn(candidate, self.code.len());

        let (a_blocks, a_words) = self.code.as_chunks::<32>();
        let (b_blocks, b_words) = candidate.as_chunks::<32>();
        let mut accu = arch::mismatches_32(a_blocks, b_blocks);

        let (a_words, _) = a_words.as_chunks::<8>();
        let (b_words, _) = b_words.as_chunks::<8>();
        for (a, b) in std::iter::zip(a_words, b_words) {
            accu += generalized_hamming_64(load_u64(a, 0) ^ load_u64(b, 0));
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

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;
    use crate::popcount;

    /// Generate a pair of codes that agree on roughly half of their bytes so that both
    /// equal and unequal lanes are well represented.
    fn similar_pair(rng: &mut StdRng, len: usize) -> (Vec<u8>, Vec<u8>) {
        let a: Vec<u8> = (0..len).map(|_| rng.random()).collect();
        let b = a
            .iter()
            .map(|x| if rng.random_bool(0.5) { rng.random() } else { *x })
            .collect();
        (a, b)
    }

    fn check_computer<C>(width: usize, rng: &mut StdRng)
    where
        C: for<'a> HammingComputer<'a>,
    {
        let zeros = vec![0u8; width];
        let ones = vec![0xffu8; width];
        assert_eq!(C::new(&zeros).hamming(&ones), width as u32);
        assert_eq!(C::new(&zeros).code_size(), width);

        for _ in 0..5000 {
            let (a, b) = similar_pair(rng, width);
            let expected = popcount::generalized_hamming(&a, &b).unwrap();

            let ca = C::new(&a);
            assert_eq!(ca.hamming(&b), expected, "width = {width}");
            assert_eq!(C::new(&b).hamming(&a), expected, "symmetry");
            assert_eq!(ca.hamming(&a), 0, "identity");

            // Both strategies agree.
            assert_eq!(GenHammingComputerM8::new(&a).hamming(&b), expected);
        }
    }

    #[test]
    fn fixed_width_generalized_computers() {
        let mut rng = StdRng::seed_from_u64(0x41b2_e90f_5c63_d718);
        check_computer::<GenHammingComputer8>(8, &mut rng);
        check_computer::<GenHammingComputer16>(16, &mut rng);
        check_computer::<GenHammingComputer32>(32, &mut rng);
    }

    #[test]
    fn multiple_of_eight() {
        let mut rng = StdRng::seed_from_u64(0xd84c_1a77_0b2e_93f5);
        for words in 0..=20 {
            let len = 8 * words;
            let zeros = vec![0u8; len];
            let ones = vec![0xffu8; len];
            let computer = GenHammingComputerM8::new(&zeros);
            assert_eq!(computer.code_size(), len);
            assert_eq!(computer.hamming(&ones), len as u32);

            for _ in 0..500 {
                let (a, b) = similar_pair(&mut rng, len);
                let expected = popcount::generalized_hamming(&a, &b).unwrap();
                assert_eq!(GenHammingComputerM8::new(&a).hamming(&b), expected);
                assert_eq!(GenHammingComputerM8::new(&b).hamming(&a), expected);
                assert_eq!(GenHammingComputerM8::new(&a).hamming(&a), 0);
            }
        }
    }

    #[test]
    fn generalized_example() {
        let a = 0x0102030405060708u64.to_le_bytes();
        let b = 0xFF02030405060709u64.to_le_bytes();
        assert_eq!(GenHammingComputer8::new(&a).hamming(&b), 2);
        assert_eq!(GenHammingComputerM8::new(&a).hamming(&b), 2);
    }

    #[test]
    fn single_differing_lane() {
        let a = [0x33u8; 32];
        for i in 0..32 {
            for delta in [1u8, 0x80, 0xff] {
                let mut b = a;
                b[i] ^= delta;
                assert_eq!(GenHammingComputer32::new(&a).hamming(&b), 1);
                if i < 16 {
                    let a16: &[u8; 16] = a.first_chunk().unwrap();
                    assert_eq!(GenHammingComputer16::new(a16).hamming(&b), 1);
                } else {
                    assert_eq!(GenHammingComputer16::new(&a[..16]).hamming(&b), 0);
                }
            }
        }
    }

    #[test]
    fn rejected_sizes() {
        assert_eq!(
            GenHammingComputerM8::try_new(&[0u8; 12]).unwrap_err(),
            CodeSizeError::NotMultiple {
                multiple_of: 8,
                actual: 12
            }
        );
        assert_eq!(
            GenHammingComputer16::try_new(&[0u8; 8]).unwrap_err(),
            CodeSizeError::Mismatch {
                expected: 16,
                actual: 8
            }
        );
    }
}
