/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

use thiserror::Error;

/// Errors reported by the selection kernel and the device it runs on.
///
/// Argument errors are raised on the host when a launch is requested. Execution errors
/// ([`Self::OutOfMemory`] and [`Self::LaunchFailed`]) are raised while the kernel runs and
/// are observed when the host synchronizes with the stream or waits on the launch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum SelectError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("out of memory: failed to allocate {bytes} bytes")]
    OutOfMemory { bytes: usize },

    #[error("kernel launch failed: {0}")]
    LaunchFailed(String),

    #[error("the stream has shut down and can no longer accept or complete launches")]
    StreamClosed,

    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),
}

impl SelectError {
    /// Return `true` if this error was raised while the kernel was executing rather than
    /// when the launch was requested.
    pub fn is_execution_error(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. } | Self::LaunchFailed(_))
    }

    pub(crate) fn invalid_argument(message: impl std::fmt::Display) -> Self {
        Self::InvalidArgument(message.to_string())
    }

    /// Convert the payload of a caught panic into a [`Self::LaunchFailed`].
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "kernel panicked with a non-string payload".to_string()
        };
        Self::LaunchFailed(message)
    }
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        assert_eq!(
            SelectError::invalid_argument("k (6) exceeds the number of columns (5)").to_string(),
            "invalid argument: k (6) exceeds the number of columns (5)"
        );
        assert_eq!(
            SelectError::OutOfMemory { bytes: 128 }.to_string(),
            "out of memory: failed to allocate 128 bytes"
        );
    }

    #[test]
    fn execution_errors() {
        assert!(SelectError::OutOfMemory { bytes: 1 }.is_execution_error());
        assert!(SelectError::LaunchFailed("boom".into()).is_execution_error());
        assert!(!SelectError::InvalidArgument("k".into()).is_execution_error());
        assert!(!SelectError::StreamClosed.is_execution_error());
    }

    #[test]
    fn panic_payloads() {
        let err = SelectError::from_panic(Box::new("static message"));
        assert_eq!(err, SelectError::LaunchFailed("static message".into()));

        let err = SelectError::from_panic(Box::new(String::from("owned message")));
        assert_eq!(err, SelectError::LaunchFailed("owned message".into()));

        let err = SelectError::from_panic(Box::new(42usize));
        assert!(matches!(err, SelectError::LaunchFailed(_)));
    }
}
