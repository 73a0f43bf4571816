//! Storage error taxonomy
//!
//! Five caller-visible kinds: coordinate validation, immutable-layer
//! policy rejection, lock contention, storage failure, and malformed
//! queries, plus eager input rejection for content and agent ids. Each
//! kind is a distinct variant so callers match on structure, never on
//! message text.

use std::time::Duration;

use thiserror::Error;

use lattice_domain::{CoordinateError, ImmutableLayerError};

/// Errors surfaced by the storage layer
#[derive(Error, Debug)]
pub enum StoreError {
    /// A coordinate component or query threshold failed validation
    #[error(transparent)]
    Coordinate(#[from] CoordinateError),

    /// Write or delete rejected by the layer mutability policy
    ///
    /// Propagated verbatim from the domain layer; never wrapped into
    /// [`StoreError::Storage`] so callers can always distinguish a policy
    /// rejection from an I/O failure.
    #[error(transparent)]
    ImmutableLayer(#[from] ImmutableLayerError),

    /// The per-file write lock could not be acquired within the timeout
    #[error(
        "lock timeout after {timeout:?} while storing at ({x}, {y}, {z}): \
         another process may be writing to this coordinate"
    )]
    Concurrency {
        /// Work-item identifier of the contended cell
        x: String,
        /// Stage of the contended cell
        y: u8,
        /// Layer of the contended cell
        z: u8,
        /// The bounded wait that elapsed
        timeout: Duration,
    },

    /// Filesystem or git operation failed
    #[error("storage failure: {context}")]
    Storage {
        /// What the store was doing when the failure occurred
        context: String,
        /// The underlying cause
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Query parameters are malformed (inverted bounds, empty term list)
    #[error("invalid query: {0}")]
    Query(String),

    /// Content is empty or exceeds the size bound
    #[error("invalid content: {0}")]
    InvalidContent(String),

    /// The manager was constructed with a blank agent identifier
    #[error("agent_id must not be empty")]
    InvalidAgent,
}

impl StoreError {
    /// Wrap an underlying failure as a storage error with context
    pub fn storage(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        StoreError::Storage {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
