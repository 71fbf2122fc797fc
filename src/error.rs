//! Unified error handling for trackline.
//!
//! The crate's query surface is deliberately non-throwing: timestamps,
//! vertices, or segment limits that don't exist in the structure produce
//! empty/absent results so exploratory queries can be chained freely. The
//! only operation that can fail is direct positional access, which reports
//! the requested index together with the valid bound.

use thiserror::Error;

/// Errors produced by trackline operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TracklineError {
    /// Positional access past the end of a fixed-arity collection.
    #[error("index {index} out of range (valid 0..{len})")]
    IndexOutOfRange {
        /// The index that was requested.
        index: usize,
        /// Number of addressable elements.
        len: usize,
    },
}

/// Result type alias for trackline operations.
pub type Result<T> = std::result::Result<T, TracklineError>;

/// Extension trait for converting positional `Option` lookups into results
/// carrying the out-of-range context.
pub trait OptionExt<T> {
    /// Convert `None` into [`TracklineError::IndexOutOfRange`].
    fn ok_or_out_of_range(self, index: usize, len: usize) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_out_of_range(self, index: usize, len: usize) -> Result<T> {
        self.ok_or(TracklineError::IndexOutOfRange { index, len })
    }
}
