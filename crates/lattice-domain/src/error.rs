//! Domain error types

use thiserror::Error;

/// Errors raised when constructing or parsing a [`crate::Coordinate`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinateError {
    /// The x component is not a valid work-item identifier
    #[error("x must be a work-item id of the form 'prefix-xxx', got: {0:?}")]
    InvalidWorkItem(String),

    /// The y component is outside the valid stage range
    #[error("y must be in 1..=5, got {0}")]
    StageOutOfRange(u8),

    /// The z component is outside the valid layer range
    #[error("z must be in 1..=4, got {0}")]
    LayerOutOfRange(u8),

    /// A stage threshold supplied to a rollback query is out of range
    ///
    /// Thresholds may point one past the last stage so "everything before
    /// the end of an item" is expressible.
    #[error("y threshold must be in 1..=6, got {0}")]
    StageThresholdOutOfRange(u8),

    /// A filesystem path does not encode a coordinate
    #[error("path does not encode a coordinate: {0}")]
    InvalidPath(String),
}

/// Write or delete rejected by the layer mutability policy
///
/// This error is correctness-critical and is surfaced verbatim to callers;
/// the storage layer never wraps it into a generic storage failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImmutableLayerError {
    /// An occupied cell in an immutable layer cannot be overwritten
    #[error(
        "cannot modify decision at ({x}, {y}, {z}) in {layer} layer: \
         {layer} layer decisions are immutable once stored"
    )]
    WriteRejected {
        /// Work-item identifier of the rejected cell
        x: String,
        /// Stage of the rejected cell
        y: u8,
        /// Layer of the rejected cell
        z: u8,
        /// Layer name, for diagnostics
        layer: &'static str,
    },

    /// Deletion is unsupported for every layer
    #[error("cannot delete decision at ({x}, {y}, {z}): deletion is not supported for any layer")]
    DeleteRejected {
        /// Work-item identifier of the rejected cell
        x: String,
        /// Stage of the rejected cell
        y: u8,
        /// Layer of the rejected cell
        z: u8,
    },
}

/// Errors raised when reading or writing a record file
#[derive(Error, Debug)]
pub enum RecordError {
    /// Underlying filesystem failure
    #[error("record file i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// The file exists but does not hold a well-formed record
    #[error("malformed record file: {0}")]
    Json(#[from] serde_json::Error),
}
