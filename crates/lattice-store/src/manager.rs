//! Manager module - the storage façade
//!
//! Validates inputs, serializes same-cell writers with a per-file lock,
//! enforces the layer policy against on-disk truth, performs atomic
//! writes, and keeps the private in-memory index current.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lattice_domain::{
    Coordinate, CoordinateError, DecisionRecord, Layer, RecordError, STORAGE_DIR,
    MAX_CONTENT_BYTES,
};

use crate::error::StoreError;
use crate::git::GitPersistence;
use crate::index::{MemoryIndex, RangeQuery};
use crate::lock::{LockError, PathLock};

/// Default bounded wait for the per-file write lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Main interface to the coordinate-addressed decision store
///
/// Any number of manager instances, in the same or different processes,
/// may operate against the same repository concurrently. Instances share
/// only the filesystem; each owns a private index that can be rebuilt at
/// any time via [`MemoryManager::load_from_disk`] or
/// [`MemoryManager::recover`].
pub struct MemoryManager {
    repo_path: PathBuf,
    storage_dir: PathBuf,
    agent_id: String,
    lock_timeout: Duration,
    index: MemoryIndex,
    git: GitPersistence,
}

impl MemoryManager {
    /// Open the store rooted at a git repository
    ///
    /// Creates the storage directory if absent and loads every existing
    /// record into the index.
    ///
    /// # Errors
    /// [`StoreError::InvalidAgent`] for a blank agent id;
    /// [`StoreError::Storage`] when the path is missing or not a git
    /// repository.
    pub fn new(
        repo_path: impl AsRef<Path>,
        agent_id: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let agent_id = agent_id.into();
        if agent_id.trim().is_empty() {
            return Err(StoreError::InvalidAgent);
        }

        let repo_path = repo_path.as_ref();
        if !repo_path.exists() {
            return Err(StoreError::storage(
                format!("repository path does not exist: {}", repo_path.display()),
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ));
        }
        if !repo_path.join(".git").exists() {
            return Err(StoreError::storage(
                format!("not a git repository: {}", repo_path.display()),
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ));
        }
        let repo_path = repo_path
            .canonicalize()
            .map_err(|e| StoreError::storage("resolving repository path", e))?;

        let storage_dir = repo_path.join(STORAGE_DIR);
        fs::create_dir_all(&storage_dir)
            .map_err(|e| StoreError::storage("creating storage directory", e))?;

        let git = GitPersistence::new(&repo_path);
        let mut manager = Self {
            repo_path,
            storage_dir,
            agent_id,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            index: MemoryIndex::new(),
            git,
        };

        let count = manager.load_from_disk()?;
        tracing::info!(
            "initialized decision store for agent '{}' at {} with {count} existing decision(s)",
            manager.agent_id,
            manager.repo_path.display(),
        );
        Ok(manager)
    }

    /// Override the per-file lock timeout used by [`MemoryManager::store`]
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// The agent identifier stamped onto records written by this manager
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Number of decisions currently indexed
    pub fn record_count(&self) -> usize {
        self.index.len()
    }

    /// Store a decision at `coord`
    ///
    /// Content is validated eagerly, before any I/O. The write itself
    /// takes a bounded-wait advisory lock on the target file, re-reads the
    /// on-disk record under the lock, applies the layer policy against
    /// that on-disk truth, and replaces the file atomically via a
    /// temporary sibling and rename. The in-memory index is updated after
    /// the lock is released.
    ///
    /// # Errors
    /// [`StoreError::InvalidContent`] for empty or oversized content;
    /// [`StoreError::ImmutableLayer`] when the layer policy rejects the
    /// write (propagated verbatim); [`StoreError::Concurrency`] on lock
    /// timeout; [`StoreError::Storage`] on any other I/O failure.
    pub fn store(
        &mut self,
        coord: &Coordinate,
        content: &str,
        issue_context: Option<BTreeMap<String, String>>,
    ) -> Result<DecisionRecord, StoreError> {
        if content.trim().is_empty() {
            return Err(StoreError::InvalidContent(
                "content must not be empty".to_string(),
            ));
        }
        if content.len() > MAX_CONTENT_BYTES {
            return Err(StoreError::InvalidContent(format!(
                "content too large: {} bytes (max {MAX_CONTENT_BYTES})",
                content.len()
            )));
        }

        let layer = Layer::from_z(coord.z())?;
        let record = DecisionRecord::new(
            coord.clone(),
            content,
            self.agent_id.clone(),
            issue_context,
        );

        let file_path = self.repo_path.join(coord.storage_path());
        let parent = file_path
            .parent()
            .expect("storage paths always have a parent");
        fs::create_dir_all(parent)
            .map_err(|e| StoreError::storage(format!("creating cell directory for {coord}"), e))?;

        let lock_path = lock_path_for(&file_path);
        let guard = PathLock::acquire(&lock_path, self.lock_timeout).map_err(|err| match err {
            LockError::Timeout { timeout, .. } => {
                tracing::error!("lock timeout storing decision at {coord}");
                StoreError::Concurrency {
                    x: coord.x().to_string(),
                    y: coord.y(),
                    z: coord.z(),
                    timeout,
                }
            }
            LockError::Io { .. } => StoreError::storage(format!("locking cell {coord}"), err),
        })?;

        // The immutability check must run against what is on disk *now*,
        // after lock acquisition; the index may be stale relative to
        // writers in other processes.
        let existing = match DecisionRecord::from_file(&file_path) {
            Ok(record) => Some(record),
            Err(RecordError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => {
                return Err(StoreError::storage(
                    format!("reading existing decision at {coord}"),
                    err,
                ))
            }
        };
        layer.validate_write(coord, existing.as_ref())?;

        write_atomically(&record, &file_path, parent)?;
        drop(guard);

        // Index upkeep happens outside the lock; the index is private
        self.index.add(coord, record.header(), content);

        tracing::info!(
            "stored decision at {coord} (layer={layer}, size={} bytes)",
            content.len()
        );
        Ok(record)
    }

    /// Retrieve the decision at `coord`, if any
    ///
    /// A coordinate that is unindexed, or whose file vanished since
    /// indexing, is a normal `Ok(None)`.
    ///
    /// # Errors
    /// [`StoreError::Storage`] only on unexpected read or parse failure.
    pub fn get(&self, coord: &Coordinate) -> Result<Option<DecisionRecord>, StoreError> {
        let Some(rel_path) = self.index.query_exact(coord) else {
            return Ok(None);
        };
        let full_path = self.repo_path.join(rel_path);

        match DecisionRecord::from_file(&full_path) {
            Ok(record) => Ok(Some(record)),
            Err(RecordError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::storage(
                format!("reading decision at {coord}"),
                err,
            )),
        }
    }

    /// Whether a decision exists at `coord`
    ///
    /// Requires both an index hit and the file still being on disk.
    pub fn exists(&self, coord: &Coordinate) -> bool {
        self.index
            .query_exact(coord)
            .is_some_and(|rel| self.repo_path.join(rel).exists())
    }

    /// Decisions whose coordinates fall inside the given per-axis bounds
    ///
    /// # Errors
    /// [`StoreError::Query`] when a numeric bound is inverted;
    /// [`StoreError::Storage`] on unexpected read failure while hydrating.
    pub fn query_range(&self, query: &RangeQuery<'_>) -> Result<Vec<DecisionRecord>, StoreError> {
        if let Some((y_min, y_max)) = query.y_range {
            if y_min > y_max {
                return Err(StoreError::Query(format!(
                    "invalid y_range: min ({y_min}) > max ({y_max})"
                )));
            }
        }
        if let Some((z_min, z_max)) = query.z_range {
            if z_min > z_max {
                return Err(StoreError::Query(format!(
                    "invalid z_range: min ({z_min}) > max ({z_max})"
                )));
            }
        }

        self.hydrate(self.index.query_range(query))
    }

    /// Decisions strictly before `(x_threshold, y_threshold)` in the
    /// partial order, i.e. everything that happened before this point.
    ///
    /// `y_threshold` may be one past the last stage (6) so the whole of a
    /// work item can sit below the threshold. The layer never participates
    /// in the ordering; `z_filter` only restricts the result set.
    ///
    /// # Errors
    /// [`StoreError::Coordinate`] for an out-of-range threshold or filter;
    /// [`StoreError::Storage`] on unexpected read failure while hydrating.
    pub fn query_partial_order(
        &self,
        x_threshold: &str,
        y_threshold: u8,
        z_filter: Option<u8>,
        ordering: Option<&HashMap<String, usize>>,
    ) -> Result<Vec<DecisionRecord>, StoreError> {
        if !(1..=6).contains(&y_threshold) {
            return Err(CoordinateError::StageThresholdOutOfRange(y_threshold).into());
        }
        if let Some(z) = z_filter {
            Layer::from_z(z)?;
        }

        self.hydrate(
            self.index
                .query_partial_order(x_threshold, y_threshold, z_filter, ordering),
        )
    }

    /// Decisions whose content matches the search terms
    ///
    /// `match_all` requires every term; otherwise any term suffices.
    /// Results are ordered by relevance (how many terms the content
    /// contains), ties broken by coordinate order. If the index was
    /// rebuilt without content (see [`MemoryManager::recover`]), this
    /// forces a full reload first.
    ///
    /// # Errors
    /// [`StoreError::Query`] for an empty term list;
    /// [`StoreError::Storage`] on unexpected read failure.
    pub fn search_content(
        &mut self,
        terms: &[&str],
        match_all: bool,
    ) -> Result<Vec<DecisionRecord>, StoreError> {
        if terms.is_empty() {
            return Err(StoreError::Query("search terms must not be empty".to_string()));
        }

        if !self.index.has_content_index() {
            tracing::debug!("content index is cold, reloading records from disk");
            self.load_from_disk()?;
        }

        let mut results = self.hydrate(self.index.query_content(terms, match_all))?;
        let relevance = |record: &DecisionRecord| -> usize {
            let content = record.content.to_lowercase();
            terms
                .iter()
                .filter(|term| content.contains(&term.to_lowercase()))
                .count()
        };
        results.sort_by_key(|record| std::cmp::Reverse(relevance(record)));
        Ok(results)
    }

    /// Commit pending storage changes to git
    ///
    /// A no-op when nothing changed. Without an explicit message a default
    /// one carrying the current record count is generated.
    ///
    /// # Errors
    /// [`StoreError::Storage`] when a git operation fails.
    pub fn sync(&self, message: Option<&str>) -> Result<(), StoreError> {
        let has_changes = self
            .git
            .has_changes()
            .map_err(|e| StoreError::storage("checking git status", e))?;
        if !has_changes {
            tracing::debug!("sync called but no changes to commit");
            return Ok(());
        }

        tracing::info!("starting git sync of decision store changes");
        self.git
            .add_all()
            .map_err(|e| StoreError::storage("staging storage directory", e))?;
        self.git
            .commit(message, self.index.len())
            .map_err(|e| StoreError::storage("committing storage directory", e))?;
        tracing::info!("git sync completed ({} decision(s))", self.index.len());
        Ok(())
    }

    /// Reload every record from the storage tree, content included
    ///
    /// Called automatically at construction; call it manually to pick up
    /// writes made by other manager instances. Corrupt files are skipped,
    /// never fatal. Returns the number of decisions indexed.
    ///
    /// # Errors
    /// [`StoreError::Storage`] is reserved for failures of the scan
    /// itself; individual file failures only log.
    pub fn load_from_disk(&mut self) -> Result<usize, StoreError> {
        self.index.clear();
        if !self.storage_dir.exists() {
            return Ok(0);
        }

        let mut count = 0;
        for entry in walkdir::WalkDir::new(&self.storage_dir)
            .into_iter()
            .filter_map(Result::ok)
        {
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
            match DecisionRecord::from_file(path) {
                Ok(record) => {
                    self.index.add(&coord, record.header(), &record.content);
                    count += 1;
                }
                Err(err) => {
                    tracing::warn!("skipping unloadable record {}: {err}", path.display());
                }
            }
        }
        self.index.mark_content_indexed();
        Ok(count)
    }

    /// Fast crash recovery: rebuild the index from headers only
    ///
    /// Cheaper than [`MemoryManager::load_from_disk`] because record
    /// bodies stay unread; the first content search afterwards triggers
    /// the full reload. Returns the number of decisions indexed.
    pub fn recover(&mut self) -> usize {
        self.index.rebuild(&self.storage_dir)
    }

    /// Load full records for a list of coordinates, dropping any whose
    /// file vanished between index lookup and read
    fn hydrate(&self, coords: Vec<Coordinate>) -> Result<Vec<DecisionRecord>, StoreError> {
        let mut records = Vec::with_capacity(coords.len());
        for coord in coords {
            if let Some(record) = self.get(&coord)? {
                records.push(record);
            }
        }
        Ok(records)
    }
}

/// Lock artifact colocated with the record file: `<file>.lock`
fn lock_path_for(file_path: &Path) -> PathBuf {
    let mut os = file_path.as_os_str().to_os_string();
    os.push(".lock");
    PathBuf::from(os)
}

/// Write a record next to its final path and atomically rename it in, so
/// concurrent readers see either the old complete file or the new one
fn write_atomically(
    record: &DecisionRecord,
    file_path: &Path,
    parent: &Path,
) -> Result<(), StoreError> {
    let coord = &record.coordinate;
    let json = record
        .to_json()
        .map_err(|e| StoreError::storage(format!("serializing decision at {coord}"), e))?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| StoreError::storage(format!("creating temp file for {coord}"), e))?;
    temp.write_all(json.as_bytes())
        .map_err(|e| StoreError::storage(format!("writing decision at {coord}"), e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| StoreError::storage(format!("flushing decision at {coord}"), e))?;
    temp.persist(file_path)
        .map_err(|e| StoreError::storage(format!("renaming decision into place at {coord}"), e.error))?;
    Ok(())
}
