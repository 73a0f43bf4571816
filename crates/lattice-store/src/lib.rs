//! Lattice Storage Layer
//!
//! Coordinate-addressed, git-mirrored persistence for agent decision
//! records. The filesystem is the single source of truth; every manager
//! instance owns a private, disposable in-memory index rebuilt from disk.
//!
//! # Architecture
//!
//! - [`MemoryIndex`]: exact lookup, range scans, partial-order scans and
//!   inverted content search over the coordinates currently on disk
//! - [`PathLock`]: scoped advisory file lock with a bounded wait, the only
//!   blocking point in the system
//! - [`GitPersistence`]: thin adapter over the `git` CLI for durability
//!   snapshots (add/commit/status/has-changes)
//! - [`MemoryManager`]: the orchestrating façade for validation, locking,
//!   layer policy, atomic writes, index upkeep, crash recovery
//!
//! # Examples
//!
//! ```no_run
//! use lattice_domain::Coordinate;
//! use lattice_store::MemoryManager;
//!
//! let mut manager = MemoryManager::new("/path/to/repo", "agent-1").unwrap();
//! let coord = Coordinate::new("proj-abc", 2, 1).unwrap();
//! manager.store(&coord, "use PostgreSQL for persistence", None).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod git;
pub mod index;
pub mod lock;
pub mod manager;

// Re-exports for convenience
pub use error::StoreError;
pub use git::GitPersistence;
pub use index::{MemoryIndex, RangeQuery};
pub use lock::PathLock;
pub use manager::MemoryManager;
