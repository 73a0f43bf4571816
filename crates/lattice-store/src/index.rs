//! In-memory index over the on-disk storage tree
//!
//! The index is a disposable cache: every structure in it can be rebuilt
//! by scanning the storage directory, and nothing in it is authoritative.
//! It exists to make exact lookups O(1) and to keep range, partial-order
//! and content queries off the filesystem.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use walkdir::WalkDir;

use lattice_domain::{Coordinate, PartialOrder, RecordHeader};

/// Parameters for a range scan, one optional inclusive bound per axis
///
/// When `ordering` is supplied, the x bounds are interpreted against that
/// topological ranking instead of lexicographic identifier order; work
/// items missing from the ranking sort as if maximally late.
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeQuery<'a> {
    /// Inclusive `(min, max)` bound on work-item identifiers
    pub x_range: Option<(&'a str, &'a str)>,
    /// Inclusive `(min, max)` bound on stages
    pub y_range: Option<(u8, u8)>,
    /// Inclusive `(min, max)` bound on layers
    pub z_range: Option<(u8, u8)>,
    /// Optional topological ranking for x comparisons
    pub ordering: Option<&'a HashMap<String, usize>>,
}

/// Index over every coordinate currently known to this manager instance
///
/// Four structures, all keyed by coordinate: the primary path map, the
/// lightweight header map, per-layer buckets, and an inverted word index
/// over record content. After a header-only [`MemoryIndex::rebuild`] the
/// inverted index is empty until content is reloaded.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    coords: HashMap<Coordinate, PathBuf>,
    headers: HashMap<Coordinate, RecordHeader>,
    layers: HashMap<u8, Vec<Coordinate>>,
    content: HashMap<String, HashSet<Coordinate>>,
    content_indexed: bool,
}

impl MemoryIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self {
            layers: (1..=4).map(|z| (z, Vec::new())).collect(),
            content_indexed: true,
            ..Default::default()
        }
    }

    /// Number of indexed coordinates
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    /// Whether the index holds no coordinates
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Whether record content has been tokenized into the inverted index
    ///
    /// False after a header-only rebuild; content queries should trigger a
    /// full reload first.
    pub fn has_content_index(&self) -> bool {
        self.content_indexed
    }

    /// Insert a coordinate into all structures
    ///
    /// Idempotent for identical input. Pass empty `content` when only the
    /// header is known (rebuild path).
    pub fn add(&mut self, coord: &Coordinate, header: RecordHeader, content: &str) {
        self.coords.insert(coord.clone(), coord.storage_path());
        self.headers.insert(coord.clone(), header);

        let bucket = self.layers.entry(coord.z()).or_default();
        if !bucket.contains(coord) {
            bucket.push(coord.clone());
        }

        for word in tokenize(content) {
            self.content.entry(word).or_default().insert(coord.clone());
        }
    }

    /// Remove a coordinate from all structures
    ///
    /// Internal bookkeeping only; the store has no public delete.
    pub fn remove(&mut self, coord: &Coordinate) {
        self.coords.remove(coord);
        self.headers.remove(coord);
        if let Some(bucket) = self.layers.get_mut(&coord.z()) {
            bucket.retain(|c| c != coord);
        }
        for set in self.content.values_mut() {
            set.remove(coord);
        }
    }

    /// O(1) lookup of the storage path for an exact coordinate
    pub fn query_exact(&self, coord: &Coordinate) -> Option<&Path> {
        self.coords.get(coord).map(PathBuf::as_path)
    }

    /// Scan for coordinates inside the given per-axis bounds
    ///
    /// Returns matches sorted ascending.
    pub fn query_range(&self, query: &RangeQuery<'_>) -> Vec<Coordinate> {
        let mut results: Vec<Coordinate> = self
            .coords
            .keys()
            .filter(|coord| {
                if let Some((x_min, x_max)) = query.x_range {
                    let inside = match query.ordering {
                        Some(map) => {
                            let pos = |id: &str| map.get(id).copied();
                            // Missing bounds collapse to the widest window
                            let x_pos = pos(coord.x()).unwrap_or(usize::MAX);
                            let min_pos = pos(x_min).unwrap_or(usize::MIN);
                            let max_pos = pos(x_max).unwrap_or(usize::MAX);
                            min_pos <= x_pos && x_pos <= max_pos
                        }
                        None => x_min <= coord.x() && coord.x() <= x_max,
                    };
                    if !inside {
                        return false;
                    }
                }
                if let Some((y_min, y_max)) = query.y_range {
                    if !(y_min..=y_max).contains(&coord.y()) {
                        return false;
                    }
                }
                if let Some((z_min, z_max)) = query.z_range {
                    if !(z_min..=z_max).contains(&coord.z()) {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();
        results.sort();
        results
    }

    /// Every coordinate strictly before `(x_threshold, y_threshold)` in
    /// the partial order, optionally restricted to one layer
    ///
    /// The layer axis never participates in the comparison itself; it is
    /// only a post-filter. Returns matches sorted ascending.
    pub fn query_partial_order(
        &self,
        x_threshold: &str,
        y_threshold: u8,
        z_filter: Option<u8>,
        ordering: Option<&HashMap<String, usize>>,
    ) -> Vec<Coordinate> {
        let order = PartialOrder::from_ranking(ordering);
        let mut results: Vec<Coordinate> = self
            .coords
            .keys()
            .filter(|coord| {
                order.less_than((coord.x(), coord.y()), (x_threshold, y_threshold))
                    && z_filter.is_none_or(|z| coord.z() == z)
            })
            .cloned()
            .collect();
        results.sort();
        results
    }

    /// Coordinates whose content contains the search terms
    ///
    /// `match_all` intersects the per-term sets; otherwise they are
    /// unioned. Terms are lowercased before lookup. Returns matches
    /// sorted ascending.
    pub fn query_content(&self, terms: &[&str], match_all: bool) -> Vec<Coordinate> {
        if terms.is_empty() {
            return Vec::new();
        }

        let term_sets: Vec<&HashSet<Coordinate>> = terms
            .iter()
            .map(|term| term.to_lowercase())
            .map(|term| self.content.get(&term).unwrap_or(&EMPTY_SET))
            .collect();

        let mut matched: HashSet<Coordinate> = if match_all {
            let mut iter = term_sets.into_iter();
            let first = iter.next().cloned().unwrap_or_default();
            iter.fold(first, |acc, set| acc.intersection(set).cloned().collect())
        } else {
            term_sets.into_iter().flatten().cloned().collect()
        };

        let mut results: Vec<Coordinate> = matched.drain().collect();
        results.sort();
        results
    }

    /// Rebuild the index from the storage tree rooted at `root`
    ///
    /// Clears everything, walks every `*.json` file, parses the
    /// coordinate from the path and reads only the record header; content
    /// stays unloaded. Files that fail to parse are skipped so a single
    /// corrupt record never blocks recovery of the rest. Returns the
    /// number of coordinates indexed.
    pub fn rebuild(&mut self, root: &Path) -> usize {
        self.clear();
        self.content_indexed = false;

        if !root.exists() {
            return 0;
        }

        let mut count = 0;
        for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some("json")
            {
                continue;
            }

            let coord = match Coordinate::from_path(path) {
                Ok(coord) => coord,
                Err(err) => {
                    tracing::warn!("skipping non-coordinate file {}: {err}", path.display());
                    continue;
                }
            };
            let header = match RecordHeader::from_file(path) {
                Ok(header) => header,
                Err(err) => {
                    tracing::warn!("skipping unreadable record {}: {err}", path.display());
                    continue;
                }
            };

            self.add(&coord, header, "");
            count += 1;
        }
        count
    }

    /// Drop every entry from every structure
    pub fn clear(&mut self) {
        self.coords.clear();
        self.headers.clear();
        for bucket in self.layers.values_mut() {
            bucket.clear();
        }
        self.content.clear();
        self.content_indexed = true;
    }

    /// Mark the inverted index as fully populated
    ///
    /// Called after a load that tokenized every record's content.
    pub(crate) fn mark_content_indexed(&mut self) {
        self.content_indexed = true;
    }

    /// Coordinates in one layer, unsorted
    pub fn layer_coords(&self, z: u8) -> &[Coordinate] {
        self.layers.get(&z).map(Vec::as_slice).unwrap_or(&[])
    }
}

static EMPTY_SET: LazyLock<HashSet<Coordinate>> = LazyLock::new(HashSet::new);

/// Lowercase word split on every non-word character
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
}
