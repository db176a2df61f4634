/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use crate::{
    arch,
    popcount::{exact, load_u32, load_u64, prefix, unpack, xor_popcount},
    CodeSizeError,
};

/// A distance computer holding one reference code and scoring candidate codes against it.
///
/// Implementations are independent concrete types. The trait exists so scanning loops can
/// be written once and monomorphized per width; it is never used as a trait object.
///
/// # Candidate Length
///
/// Every call to [`hamming`](Self::hamming) reads exactly the first
/// [`code_size`](Self::code_size) bytes of the candidate. Longer candidates are accepted,
/// shorter candidates panic. No implementation reads outside the candidate slice.
pub trait HammingComputer<'a>: Sized + Send + Sync {
    /// Construct a computer for the reference `code`, returning an error if the length of
    /// `code` is not supported by this computer.
    fn try_new(code: &'a [u8]) -> Result<Self, CodeSizeError>;

    /// Construct a computer for the reference `code`.
    ///
    /// # Panics
    ///
    /// Panics if `code` does not have a length supported by this computer.
    fn new(code: &'a [u8]) -> Self {
        match Self::try_new(code) {
            Ok(computer) => computer,
            Err(err) => err.panic(),
        }
    }

    /// Return the distance between the reference code and `candidate`.
    fn hamming(&self, candidate: &[u8]) -> u32;

    /// Return the number of bytes in the reference code.
    fn code_size(&self) -> usize;
}

/////////////
// Width 4 //
/////////////

/// Bitwise Hamming distance for 4-byte codes, stored as one `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HammingComputer4 {
    a0: u32,
}

impl HammingComputer4 {
    /// The code length accepted by this computer.
    pub const CODE_SIZE: usize = 4;
}

impl<'a> HammingComputer<'a> for HammingComputer4 {
    fn try_new(code: &'a [u8]) -> Result<Self, CodeSizeError> {
        let code = exact::<{ HammingComputer4::CODE_SIZE }>(code)?;
        Ok(Self {
            a0: load_u32(code, 0),
        })
    }

    #[inline(always)]
    fn hamming(&self, candidate: &[u8]) -> u32 {
        let b = prefix::<{ HammingComputer4::CODE_SIZE }>(candidate);
        (self.a0 ^ load_u32(b, 0)).count_ones()
    }

    fn code_size(&self) -> usize {
        Self::CODE_SIZE
    }
}

///////////////////////
// Whole-word widths //
///////////////////////

macro_rules! word_computer {
    ($(#[$meta:meta])* $name:ident, $words:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name {
            words: [u64; $words],
        }

        impl $name {
            /// The code length accepted by this computer.
            pub const CODE_SIZE: usize = 8 * $words;
        }

        impl<'a> HammingComputer<'a> for $name {
            fn try_new(code: &'a [u8]) -> Result<Self, CodeSizeError> {
                let code = exact::<{ $name::CODE_SIZE }>(code)?;
                Ok(Self {
                    words: unpack(code),
                })
            }

            #[inline(always)]
            fn hamming(&self, candidate: &[u8]) -> u32 {
                xor_popcount(&self.words, prefix::<{ $name::CODE_SIZE }>(candidate))
            }

            fn code_size(&self) -> usize {
                Self::CODE_SIZE
            }
        }
    };
}

word_computer!(
    /// Bitwise Hamming distance for 8-byte codes, stored as one `u64`.
    HammingComputer8,
    1
);

word_computer!(
    /// Bitwise Hamming distance for 16-byte codes, stored as two `u64`s.
    HammingComputer16,
    2
);

word_computer!(
    /// Bitwise Hamming distance for 32-byte codes, stored as four `u64`s.
    HammingComputer32,
    4
);

//////////////
// Width 20 //
//////////////

/// Bitwise Hamming distance for 20-byte codes, stored as two `u64`s and one `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HammingComputer20 {
    a0: u64,
    a1: u64,
    a2: u32,
}

impl HammingComputer20 {
    /// The code length accepted by this computer.
    pub const CODE_SIZE: usize = 20;
}

impl<'a> HammingComputer<'a> for HammingComputer20 {
    fn try_new(code: &'a [u8]) -> Result<Self, CodeSizeError> {
        let code = exact::<{ HammingComputer20::CODE_SIZE }>(code)?;
        Ok(Self {
            a0: load_u64(code, 0),
            a1: load_u64(code, 8),
            a2: load_u32(code, 16),
        })
    }

    #[inline(always)]
    fn hamming(&self, candidate: &[u8]) -> u32 {
        let b = prefix::<{ HammingComputer20::CODE_SIZE }>(candidate);
        (self.a0 ^ load_u64(b, 0)).count_ones()
            + (self.a1 ^ load_u64(b, 8)).count_ones()
            + (self.a2 ^ load_u32(b, 16)).count_ones()
    }

    fn code_size(&self) -> usize {
        Self::CODE_SIZE
    }
}

//////////////
// Width 64 //
//////////////

/// Bitwise Hamming distance for 64-byte codes, stored as eight `u64`s.
///
/// The whole code is scored as a single 512-bit block, using the vectorized popcount when
/// the compilation target provides it (see [`crate::backend`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HammingComputer64 {
    words: [u64; 8],
}

impl HammingComputer64 {
    /// The code length accepted by this computer.
    pub const CODE_SIZE: usize = 64;
}

impl<'a> HammingComputer<'a> for HammingComputer64 {
    fn try_new(code: &'a [u8]) -> Result<Self, CodeSizeError> {
        let code = exact::<{ HammingComputer64::CODE_SIZE }>(code)?;
        Ok(Self {
            words: unpack(code),
        })
    }

    #[inline(always)]
    fn hamming(&self, candidate: &[u8]) -> u32 {
        let a: &[u8; 64] = bytemuck::cast_ref(&self.words);
        arch::xor_popcount_512(a, prefix::<{ HammingComputer64::CODE_SIZE }>(candidate))
    }

    fn code_size(&self) -> usize {
        Self::CODE_SIZE
    }
}

///////////
// Tests //
///////////
