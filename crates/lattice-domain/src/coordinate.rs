//! Coordinate module - the three-axis address of a storage cell

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoordinateError;

/// Directory under the repository root that holds all record files
pub const STORAGE_DIR: &str = ".lattice-memory";

/// Work-item identifiers are `prefix-xxx`: any word/hyphen prefix followed
/// by a three character lowercase alphanumeric suffix.
static WORK_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w-]+-[a-z0-9]{3}$").expect("static pattern"));

/// Inverse of [`Coordinate::storage_path`]: `x-{x}/y-{y}-z-{z}.json`
static PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"x-([\w-]+)/y-(\d+)-z-(\d+)\.json$").expect("static pattern"));

/// A position in the three-axis space addressing stored decisions
///
/// - `x`: work-item identifier (e.g. `"proj-acc-t49"`)
/// - `y`: development stage (1=architect, 2=test, 3=implement, 4=review, 5=merge)
/// - `z`: abstraction layer (1=Architecture, 2=Interfaces, 3=Implementation, 4=Ephemeral)
///
/// Coordinates are validated at construction and immutable afterwards.
/// Equality, hashing and the total `Ord` are all structural over the
/// `(x, y, z)` tuple, so sorting a slice of coordinates yields
/// lexicographic order.
///
/// # Examples
///
/// ```
/// use lattice_domain::Coordinate;
///
/// let coord = Coordinate::new("proj-acc-t49", 2, 1).unwrap();
/// assert_eq!(coord.to_tuple(), ("proj-acc-t49", 2, 1));
/// assert!(Coordinate::new("not a work item", 2, 1).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate", into = "RawCoordinate")]
pub struct Coordinate {
    x: String,
    y: u8,
    z: u8,
}

/// Wire shape of a coordinate; funnels deserialization through validation
#[derive(Serialize, Deserialize, Clone)]
struct RawCoordinate {
    x: String,
    y: u8,
    z: u8,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = CoordinateError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(raw.x, raw.y, raw.z)
    }
}

impl From<Coordinate> for RawCoordinate {
    fn from(coord: Coordinate) -> Self {
        RawCoordinate {
            x: coord.x,
            y: coord.y,
            z: coord.z,
        }
    }
}

impl Coordinate {
    /// Create a coordinate, validating every component
    ///
    /// # Errors
    /// Returns [`CoordinateError`] if `x` is not a `prefix-xxx` work-item
    /// identifier, `y` is outside `1..=5`, or `z` is outside `1..=4`.
    pub fn new(x: impl Into<String>, y: u8, z: u8) -> Result<Self, CoordinateError> {
        let x = x.into();
        if !WORK_ITEM_RE.is_match(&x) {
            return Err(CoordinateError::InvalidWorkItem(x));
        }
        if !(1..=5).contains(&y) {
            return Err(CoordinateError::StageOutOfRange(y));
        }
        if !(1..=4).contains(&z) {
            return Err(CoordinateError::LayerOutOfRange(z));
        }
        Ok(Self { x, y, z })
    }

    /// Work-item identifier (x axis)
    pub fn x(&self) -> &str {
        &self.x
    }

    /// Development stage (y axis)
    pub fn y(&self) -> u8 {
        self.y
    }

    /// Abstraction layer (z axis)
    pub fn z(&self) -> u8 {
        self.z
    }

    /// Borrowed `(x, y, z)` tuple, handy for assertions and map keys
    pub fn to_tuple(&self) -> (&str, u8, u8) {
        (&self.x, self.y, self.z)
    }

    /// Relative storage path for this coordinate
    ///
    /// The mapping is deterministic: `.lattice-memory/x-{x}/y-{y}-z-{z}.json`.
    pub fn storage_path(&self) -> PathBuf {
        PathBuf::from(STORAGE_DIR)
            .join(format!("x-{}", self.x))
            .join(format!("y-{}-z-{}.json", self.y, self.z))
    }

    /// Parse a coordinate back out of a storage path
    ///
    /// Accepts absolute or relative paths as long as the trailing
    /// `x-{x}/y-{y}-z-{z}.json` segments are present; this is the inverse
    /// of [`Coordinate::storage_path`].
    ///
    /// # Errors
    /// Returns [`CoordinateError::InvalidPath`] when the path does not
    /// match the pattern, or the component errors when the encoded values
    /// fail validation.
    pub fn from_path(path: &Path) -> Result<Self, CoordinateError> {
        // Normalize separators so Windows paths parse too
        let text = path.to_string_lossy().replace('\\', "/");
        let caps = PATH_RE
            .captures(&text)
            .ok_or_else(|| CoordinateError::InvalidPath(text.clone()))?;

        let x = caps[1].to_string();
        let y: u8 = caps[2]
            .parse()
            .map_err(|_| CoordinateError::InvalidPath(text.clone()))?;
        let z: u8 = caps[3]
            .parse()
            .map_err(|_| CoordinateError::InvalidPath(text.clone()))?;
        Coordinate::new(x, y, z)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}
