//! Error types for picmatch.

use thiserror::Error;

/// Result alias for picmatch operations.
pub type PicMatchResult<T> = std::result::Result<T, PicMatchError>;

/// Errors that can occur while loading, distributing or searching a dataset.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum PicMatchError {
    /// The input data or parameters are invalid.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// A matrix has a zero size or a size that overflows.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// A matrix buffer does not hold the expected number of values.
    #[error("buffer size mismatch: needed {needed}, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// The dataset text ended before a required value.
    #[error("unexpected end of input: expected {expected}")]
    MissingToken { expected: &'static str },
    /// A dataset token could not be parsed as the expected value.
    #[error("invalid {expected} at token {index}: {token:?}")]
    InvalidToken {
        expected: &'static str,
        index: usize,
        token: String,
    },
    /// Two pictures share an id, so results cannot be merged by identity.
    #[error("duplicate picture id {id}")]
    DuplicatePictureId { id: i32 },
    /// No usable accelerator is present in this process.
    #[error("accelerator unavailable: {reason}")]
    AcceleratorUnavailable { reason: String },
    /// The accelerator failed while running a session.
    #[error("accelerator error: {reason}")]
    Accelerator { reason: String },
    /// Broadcasting the dataset or gathering results failed.
    #[error("distribution failed: {reason}")]
    Distribution { reason: String },
    /// A worker thread pool could not be created.
    #[error("thread pool error: {reason}")]
    ThreadPool { reason: String },
}
