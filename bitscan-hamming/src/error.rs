/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use thiserror::Error;

/// A reference or candidate code did not have the length a computer requires.
///
/// This is a small `Copy` type so the failure path of `try_new` stays cheap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodeSizeError {
    #[error("expected a code of {expected} bytes, instead got {actual}")]
    Mismatch { expected: usize, actual: usize },

    #[error("expected a code whose length is a multiple of {multiple_of} bytes, instead got {actual}")]
    NotMultiple { multiple_of: usize, actual: usize },
}

impl CodeSizeError {
    /// Escalate the error to a full-blown panic.
    ///
    /// Kept out of line so the hot paths that call it only carry a single cold branch.
    #[allow(clippy::panic)]
    #[cold]
    #[inline(never)]
    pub fn panic(self) -> ! {
        panic!("binary code size violation: {}", self)
    }
}

/// Errors returned by the batch scoring helpers in [`crate::scan`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ScanError {
    #[error("query codes must not be empty")]
    EmptyQuery,

    #[error("code buffer of {len} bytes is not a multiple of the code size {code_size}")]
    RaggedCodes { len: usize, code_size: usize },

    #[error("output buffer has length {actual} but {expected} codes were supplied")]
    OutputLength { expected: usize, actual: usize },

    #[error("requested {k} neighbors but only {available} codes were supplied")]
    NotEnoughCodes { k: usize, available: usize },

    #[error(transparent)]
    CodeSize(#[from] CodeSizeError),
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_size_messages() {
        let err = CodeSizeError::Mismatch {
            expected: 8,
            actual: 7,
        };
        assert_eq!(err.to_string(), "expected a code of 8 bytes, instead got 7");

        let err = CodeSizeError::NotMultiple {
            multiple_of: 8,
            actual: 12,
        };
        assert_eq!(
            err.to_string(),
            "expected a code whose length is a multiple of 8 bytes, instead got 12"
        );
    }

    #[test]
    #[should_panic(expected = "binary code size violation: expected a code of 16 bytes, instead got 3")]
    fn code_size_panic() {
        CodeSizeError::Mismatch {
            expected: 16,
            actual: 3,
        }
        .panic()
    }

    #[test]
    fn scan_error_wraps_code_size() {
        let err: ScanError = CodeSizeError::NotMultiple {
            multiple_of: 8,
            actual: 5,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "expected a code whose length is a multiple of 8 bytes, instead got 5"
        );
    }
}
