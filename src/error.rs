//! Error types shared across the crate.
//!
//! Every error here is recoverable by the caller: a failed decode or a
//! rejected span never aborts the process, and a failed construction never
//! leaves a half-built value behind.

use thiserror::Error;

/// Errors produced while decoding or unpacking a [`TraceContext`].
///
/// [`TraceContext`]: crate::TraceContext
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContextError {
    /// The input did not have the exact packed or encoded length for the
    /// current protocol version.
    #[error("invalid trace context length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Length the current protocol version requires.
        expected: usize,
        /// Length of the rejected input.
        actual: usize,
    },

    /// The input contained a character outside `[0-9a-fA-F]`.
    #[error("trace context contains a non-hex character")]
    InvalidHex,

    /// The version byte did not match the engine's current version.
    #[error("unsupported trace context version {0:#04x}")]
    UnsupportedVersion(u8),
}

/// Errors produced while constructing an [`Event`] or adding an edge.
///
/// [`Event`]: crate::Event
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EventError {
    /// The source context could not be decoded.
    #[error(transparent)]
    InvalidSource(#[from] ContextError),

    /// An edge was requested but the source has no usable operation id.
    #[error("cannot add edge: source operation id is invalid")]
    MissingEdgeSource,
}

/// Errors produced while finalizing a [`SpanRecord`].
///
/// [`SpanRecord`]: crate::SpanRecord
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SpanError {
    /// Span duration was negative or above the safe-integer envelope.
    ///
    /// Out-of-range durations are rejected rather than clamped; clamping
    /// would silently corrupt aggregated timing data.
    #[error("span duration {0}us is outside the safe integer range")]
    DurationOutOfRange(i64),
}
