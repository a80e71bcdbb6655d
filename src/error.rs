//! Error taxonomy
//!
//! Both variants describe a broken composition, not an environment failure.
//! I/O or network errors belong to the work behind a `lift` starter and are
//! modelled by the caller as part of the value type.

/// Programmer errors surfaced by cells and completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A write hit a cell that already holds a value, or the never cell.
    #[error("timed cell already written")]
    AlreadyWritten,
    /// A starter's completion callback was invoked more than once.
    #[error("completion callback invoked more than once")]
    DoubleCompletion,
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
