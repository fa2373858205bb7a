//! Vault path parsing and validation.
//!
//! Vault paths are relative, `/`-separated and free of `.`/`..` segments.
//! The single token `.` addresses the vault root and may not be combined
//! with other segments.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Separator between path segments.
pub const SEPARATOR: &str = "/";

/// Reserved token addressing the vault root.
pub const ROOT_PATH: &str = ".";

/// Split a path string into validated segments.
///
/// The root token, surrounding whitespace ignored, yields `["."]`. Any
/// other input is split on [`SEPARATOR`] and every segment checked.
///
/// # Errors
/// - `EmptyPath` for an empty input
/// - `AbsolutePath` when the input starts with a separator
/// - `IllegalSegment` for `.` or `..` segments, or segments holding NUL
/// - `EmptySegment` for empty segments, reporting the whole path
pub fn split(path: &str) -> Result<Vec<String>> {
    if path.trim() == ROOT_PATH {
        return Ok(vec![ROOT_PATH.to_string()]);
    }
    if path.trim().is_empty() {
        return Err(Error::EmptyPath);
    }
    if path.starts_with(SEPARATOR) {
        return Err(Error::AbsolutePath(path.to_string()));
    }

    let segments: Vec<String> = path.split(SEPARATOR).map(String::from).collect();
    validate_segments(&segments)?;
    Ok(segments)
}

/// Validate segments that did not come through [`split`].
///
/// NUL is rejected since archive entry names cannot hold it.
pub fn validate_segments(segments: &[String]) -> Result<()> {
    if segments.is_empty() {
        return Err(Error::EmptyPath);
    }
    if segments[0] == SEPARATOR {
        return Err(Error::AbsolutePath(segments.join(SEPARATOR)));
    }
    for segment in segments {
        let trimmed = segment.trim();
        if trimmed == "." || trimmed == ".." {
            return Err(Error::IllegalSegment(trimmed.to_string()));
        }
        if trimmed.is_empty() {
            return Err(Error::EmptySegment(segments.join(SEPARATOR)));
        }
        if segment.contains('\0') {
            return Err(Error::IllegalSegment(format!("NUL in {:?}", segment)));
        }
    }
    Ok(())
}

/// Check whether segments address the root.
pub fn is_root_segments(segments: &[String]) -> bool {
    segments.is_empty() || (segments.len() == 1 && segments[0] == ROOT_PATH)
}

/// A validated path within a vault.
///
/// The root path has no segments and renders as `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VaultPath {
    segments: Vec<String>,
}

impl VaultPath {
    /// Create a root path.
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Parse a path string into a VaultPath.
    pub fn parse(path: &str) -> Result<Self> {
        let segments = split(path)?;
        if is_root_segments(&segments) {
            return Ok(Self::root());
        }
        Ok(Self { segments })
    }

    /// Check if this is the root path.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Get the parent path, if any.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            None
        } else {
            let mut segments = self.segments.clone();
            segments.pop();
            Some(Self { segments })
        }
    }

    /// Get the last segment, or `.` for the root.
    pub fn name(&self) -> &str {
        self.segments
            .last()
            .map(|s| s.as_str())
            .unwrap_or(ROOT_PATH)
    }

    /// Join this path with a child segment.
    pub fn join(&self, child: &str) -> Result<Self> {
        if child.contains(SEPARATOR) {
            return Err(Error::InvalidInput(format!(
                "child segment cannot contain separators: {}",
                child
            )));
        }
        let mut segments = self.segments.clone();
        segments.push(child.to_string());
        validate_segments(&segments)?;
        Ok(Self { segments })
    }

    /// Get the path segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for VaultPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str(ROOT_PATH)
        } else {
            f.write_str(&self.segments.join(SEPARATOR))
        }
    }
}
