//! Layer module - mutability policy for the z axis

use crate::coordinate::Coordinate;
use crate::error::{CoordinateError, ImmutableLayerError};
use crate::record::DecisionRecord;

/// One of the four abstraction layers a decision can live in
///
/// Layers differ only in their mutability policy: Architecture decisions
/// (z=1) are immutable once stored, every other layer may be overwritten.
/// Deletion is unsupported for all layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    /// z=1: foundational decisions, immutable once stored
    Architecture,

    /// z=2: interface contracts, mutable
    Interfaces,

    /// z=3: implementation details, mutable
    Implementation,

    /// z=4: short-lived working notes, mutable
    Ephemeral,
}

impl Layer {
    /// All layers, indexed by `z - 1`
    pub const ALL: [Layer; 4] = [
        Layer::Architecture,
        Layer::Interfaces,
        Layer::Implementation,
        Layer::Ephemeral,
    ];

    /// Look up the layer for a z value
    ///
    /// # Errors
    /// Returns [`CoordinateError::LayerOutOfRange`] for z outside `1..=4`.
    pub fn from_z(z: u8) -> Result<Self, CoordinateError> {
        match z {
            1..=4 => Ok(Self::ALL[(z - 1) as usize]),
            _ => Err(CoordinateError::LayerOutOfRange(z)),
        }
    }

    /// The z value of this layer
    pub fn z(&self) -> u8 {
        match self {
            Layer::Architecture => 1,
            Layer::Interfaces => 2,
            Layer::Implementation => 3,
            Layer::Ephemeral => 4,
        }
    }

    /// Layer name as used in error messages and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Architecture => "Architecture",
            Layer::Interfaces => "Interfaces",
            Layer::Implementation => "Implementation",
            Layer::Ephemeral => "Ephemeral",
        }
    }

    /// Whether records in this layer can never be overwritten
    pub fn is_immutable(&self) -> bool {
        matches!(self, Layer::Architecture)
    }

    /// Check whether a write at `coord` is allowed given the record that
    /// is currently on disk there
    ///
    /// The caller must pass the record observed on disk *after* acquiring
    /// the write lock; validating against a cached index would let two
    /// processes race past the immutability check.
    ///
    /// # Errors
    /// Returns [`ImmutableLayerError::WriteRejected`] iff this layer is
    /// immutable and the cell is occupied.
    pub fn validate_write(
        &self,
        coord: &Coordinate,
        existing: Option<&DecisionRecord>,
    ) -> Result<(), ImmutableLayerError> {
        if self.is_immutable() && existing.is_some() {
            return Err(ImmutableLayerError::WriteRejected {
                x: coord.x().to_string(),
                y: coord.y(),
                z: coord.z(),
                layer: self.as_str(),
            });
        }
        Ok(())
    }

    /// Check whether a delete at `coord` is allowed
    ///
    /// # Errors
    /// Always returns [`ImmutableLayerError::DeleteRejected`]; the store
    /// is append/overwrite-or-reject only.
    pub fn validate_delete(&self, coord: &Coordinate) -> Result<(), ImmutableLayerError> {
        Err(ImmutableLayerError::DeleteRejected {
            x: coord.x().to_string(),
            y: coord.y(),
            z: coord.z(),
        })
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
