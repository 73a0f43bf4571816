//! Lattice Domain Layer
//!
//! This crate contains the core domain model for Lattice: the three-axis
//! coordinate system that addresses agent decision records, the layer
//! mutability policy, the record payload itself, and the partial ordering
//! used for rollback queries.
//!
//! ## Key Concepts
//!
//! - **Coordinate**: an `(x, y, z)` triple of work item, development stage,
//!   and abstraction layer, addressing exactly one storage cell
//! - **Layer**: the `z` axis; the Architecture layer (z=1) is immutable
//!   once written, all other layers may be overwritten
//! - **DecisionRecord**: the payload stored at a coordinate, serialized
//!   as one JSON file per cell
//! - **PartialOrder**: the `(x, y)` "happened before" relation, optionally
//!   driven by an externally supplied topological ranking of work items
//!
//! ## Architecture
//!
//! Pure domain logic only: no filesystem locking, no git, no index. The
//! storage orchestration lives in `lattice-store`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod coordinate;
pub mod error;
pub mod layer;
pub mod order;
pub mod record;

// Re-exports for convenience
pub use coordinate::{Coordinate, STORAGE_DIR};
pub use error::{CoordinateError, ImmutableLayerError, RecordError};
pub use layer::Layer;
pub use order::PartialOrder;
pub use record::{DecisionRecord, RecordHeader, MAX_CONTENT_BYTES};
