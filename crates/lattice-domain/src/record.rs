//! Record module - the payload stored at a coordinate

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::coordinate::Coordinate;
use crate::error::RecordError;

/// Upper bound on record content, in UTF-8 bytes (100 KiB)
pub const MAX_CONTENT_BYTES: usize = 100 * 1024;

/// A decision stored at a coordinate, with its write-time metadata
///
/// Records are immutable values: an update is a new record written to the
/// same coordinate (subject to the layer policy), never a mutation. One
/// record persists as one JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Where this decision lives
    pub coordinate: Coordinate,

    /// The decision text (non-empty, at most [`MAX_CONTENT_BYTES`])
    pub content: String,

    /// When the decision was stored
    pub timestamp: DateTime<Utc>,

    /// Identifier of the agent that stored it
    pub agent_id: String,

    /// Optional free-form context about the work item
    pub issue_context: Option<BTreeMap<String, String>>,
}

impl DecisionRecord {
    /// Create a record stamped with the current time
    pub fn new(
        coordinate: Coordinate,
        content: impl Into<String>,
        agent_id: impl Into<String>,
        issue_context: Option<BTreeMap<String, String>>,
    ) -> Self {
        Self {
            coordinate,
            content: content.into(),
            timestamp: Utc::now(),
            agent_id: agent_id.into(),
            issue_context,
        }
    }

    /// Serialize to the pretty-printed JSON stored on disk
    ///
    /// # Errors
    /// Returns [`RecordError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String, RecordError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from the on-disk JSON shape
    ///
    /// # Errors
    /// Returns [`RecordError::Json`] on malformed input, including
    /// coordinate components that fail validation.
    pub fn from_json(json: &str) -> Result<Self, RecordError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write this record to `path`, creating parent directories
    ///
    /// This writes directly to the final path; callers that need
    /// crash-safety go through the manager's temp-file-then-rename
    /// routine instead.
    ///
    /// # Errors
    /// Returns [`RecordError`] on filesystem or serialization failure.
    pub fn to_file(&self, path: &Path) -> Result<(), RecordError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Read a record back from `path`
    ///
    /// # Errors
    /// Returns [`RecordError`] if the file is missing, unreadable, or
    /// malformed.
    pub fn from_file(path: &Path) -> Result<Self, RecordError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// The lightweight header for this record
    pub fn header(&self) -> RecordHeader {
        RecordHeader {
            timestamp: self.timestamp,
            agent_id: self.agent_id.clone(),
        }
    }
}

/// The cheap-to-load slice of a record: write metadata without content
///
/// Index rebuilds read only this header from each file so recovery does
/// not pay for loading every decision body. Content queries after such a
/// rebuild force a full reload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordHeader {
    /// When the record was stored
    pub timestamp: DateTime<Utc>,

    /// Identifier of the agent that stored it
    pub agent_id: String,
}

impl RecordHeader {
    /// Read only the header fields from a record file
    ///
    /// The content field is parsed past but never retained.
    ///
    /// # Errors
    /// Returns [`RecordError`] if the file is missing, unreadable, or
    /// malformed.
    pub fn from_file(path: &Path) -> Result<Self, RecordError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
