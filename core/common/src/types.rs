//! Common types used throughout Trove.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Information about a file or directory in a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Base name of the entry.
    pub name: String,
    /// Whether this is a directory.
    pub is_dir: bool,
    /// Last modification time.
    pub modified: DateTime<Utc>,
    /// Size in bytes (zero for directories).
    pub size: u64,
}

impl FileInfo {
    /// Create info for a file.
    pub fn file(name: impl Into<String>, modified: DateTime<Utc>, size: u64) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
            modified,
            size,
        }
    }

    /// Create info for a directory.
    pub fn directory(name: impl Into<String>, modified: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
            modified,
            size: 0,
        }
    }
}
