/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Selection of the most specialized computer for a code length known only at runtime.
//!
//! Scanning loops are written once as a [`WithComputer`] visitor. The dispatch functions
//! inspect the length of the reference code a single time and invoke the visitor with the
//! matching concrete computer, so the loop body is monomorphized for every width.

use crate::{
    computer::{
        HammingComputer, HammingComputer16, HammingComputer20, HammingComputer32,
        HammingComputer4, HammingComputer64, HammingComputer8,
    },
    default::HammingComputerDefault,
    generalized::{
        GenHammingComputer16, GenHammingComputer32, GenHammingComputer8, GenHammingComputerM8,
    },
    CodeSizeError,
};

/// A computation that is generic over the concrete distance computer.
pub trait WithComputer {
    /// The result of the computation.
    type Output;

    /// Run the computation with `computer`.
    fn apply<'a, C>(self, computer: C) -> Self::Output
    where
        C: HammingComputer<'a>;
}

/// Invoke `f` with the bitwise Hamming computer best suited to `code`.
///
/// Lengths 4, 8, 16, 20, 32 and 64 use the dedicated fixed-width computers. Every other
/// length, including zero, uses [`HammingComputerDefault`].
pub fn dispatch_hamming<F>(code: &[u8], f: F) -> F::Output
where
    F: WithComputer,
{
    match code.len() {
        HammingComputer4::CODE_SIZE => f.apply(HammingComputer4::new(code)),
        HammingComputer8::CODE_SIZE => f.apply(HammingComputer8::new(code)),
        HammingComputer16::CODE_SIZE => f.apply(HammingComputer16::new(code)),
        HammingComputer20::CODE_SIZE => f.apply(HammingComputer20::new(code)),
        HammingComputer32::CODE_SIZE => f.apply(HammingComputer32::new(code)),
        HammingComputer64::CODE_SIZE => f.apply(HammingComputer64::new(code)),
        _ => f.apply(HammingComputerDefault::new(code)),
    }
}

/// Invoke `f` with the generalized Hamming computer best suited to `code`.
///
/// Lengths 8, 16 and 32 use the dedicated computers and every other multiple of 8 uses
/// [`GenHammingComputerM8`].
///
/// # Errors
///
/// Returns [`CodeSizeError::NotMultiple`] if the length of `code` is not a multiple of 8.
pub fn dispatch_gen_hamming<F>(code: &[u8], f: F) -> Result<F::Output, CodeSizeError>
where
    F: WithComputer,
{
    let output = match code.len() {
        GenHammingComputer8::CODE_SIZE => f.apply(GenHammingComputer8::new(code)),
        GenHammingComputer16::CODE_SIZE => f.apply(GenHammingComputer16::new(code)),
        GenHammingComputer32::CODE_SIZE => f.apply(GenHammingComputer32::new(code)),
        _ => f.apply(GenHammingComputerM8::try_new(code)?),
    };
    Ok(output)
}

///////////
// Tests //
///////////
