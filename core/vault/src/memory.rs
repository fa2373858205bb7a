//! In-memory vault.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fmt;
use std::io::{self, Read};
use tracing::debug;

use crate::archive;
use crate::node::{DirNode, FileNode, Node};
use trove_common::path::is_root_segments;
use trove_common::{split, Error, FileInfo, Result, ROOT_PATH, SEPARATOR};
use trove_storage::pattern;
use trove_storage::{Vault, VaultFile};

/// Options for [`MemoryVault::write_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileOptions {
    /// Modification time recorded on the file.
    pub modified: DateTime<Utc>,
}

impl FileOptions {
    /// Options with the modification time set to now.
    pub fn new() -> Self {
        Self {
            modified: Utc::now(),
        }
    }

    /// Set the modification time.
    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = modified;
        self
    }
}

impl Default for FileOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// A vault holding its whole tree in memory.
///
/// Mutation takes `&mut self`; any number of readers may share `&self`.
/// Open files keep a reference to the payload they were opened on, so a
/// later write does not affect them.
#[derive(Debug, Clone)]
pub struct MemoryVault {
    root: DirNode,
}

impl MemoryVault {
    /// Create a new empty vault.
    pub fn new() -> Self {
        Self::with_root(DirNode::root())
    }

    /// Create a vault over an existing tree.
    pub fn with_root(root: DirNode) -> Self {
        Self { root }
    }

    /// Get the root directory.
    pub fn root(&self) -> &DirNode {
        &self.root
    }

    /// Number of files in the vault.
    pub fn file_count(&self) -> usize {
        self.root.file_count()
    }

    /// Total payload size of every file in the vault.
    pub fn total_size(&self) -> u64 {
        self.root.total_size()
    }

    /// Write a file, creating missing parent directories.
    ///
    /// The source is read to the end and the vault keeps its own copy. An
    /// existing file at the path is replaced.
    ///
    /// # Postconditions
    /// - The tree is unmodified if the call fails
    ///
    /// # Errors
    /// - Invalid path
    /// - `IsADirectory` if the path is the root or an existing directory
    /// - `NotADirectory` if a parent segment names a file
    /// - `Io` if reading the source fails
    pub fn write_file(
        &mut self,
        path: &str,
        mut source: impl Read,
        options: FileOptions,
    ) -> Result<()> {
        let segments = split(path)?;
        if is_root_segments(&segments) {
            return Err(Error::IsADirectory(ROOT_PATH.to_string()));
        }

        let mut data = Vec::new();
        source.read_to_end(&mut data)?;

        let full_path = segments.join(SEPARATOR);
        debug!(path = %full_path, size = data.len(), "Writing file");

        let file = FileNode::from_bytes(full_path, Bytes::from(data), options.modified);
        self.root.put_file(&segments, file)
    }

    fn lookup(&self, path: &str) -> Result<Lookup<'_>> {
        let segments = split(path)?;
        Ok(match self.root.get_descendant(&segments)? {
            None => Lookup::Directory(&self.root),
            Some(Node::Directory(dir)) => Lookup::Directory(dir),
            Some(Node::File(file)) => Lookup::File(file),
        })
    }

    /// Encode the vault as a compressed archive.
    pub fn to_archive(&self) -> Result<Vec<u8>> {
        archive::encode(self)
    }

    /// Decode a vault from a compressed archive.
    pub fn from_archive(data: &[u8]) -> Result<Self> {
        archive::decode(data)
    }
}

/// Result of resolving a path, with the root as an ordinary directory.
enum Lookup<'a> {
    Directory(&'a DirNode),
    File(&'a FileNode),
}

impl Default for MemoryVault {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MemoryVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

impl Vault for MemoryVault {
    fn display_name(&self) -> String {
        "Memory Vault".to_string()
    }

    fn open(&self, path: &str) -> Result<Box<dyn VaultFile>> {
        match self.lookup(path)? {
            Lookup::File(file) => Ok(Box::new(MemoryFile::new(file))),
            Lookup::Directory(dir) => Err(Error::IsADirectory(dir.full_path().to_string())),
        }
    }

    fn stat(&self, path: &str) -> Result<FileInfo> {
        Ok(match self.lookup(path)? {
            Lookup::Directory(dir) => dir.stat(),
            Lookup::File(file) => file.stat(),
        })
    }

    fn read_dir(&self, path: &str) -> Result<Vec<FileInfo>> {
        match self.lookup(path)? {
            Lookup::Directory(dir) => Ok(dir
                .sorted_children()
                .into_iter()
                .map(Node::stat)
                .collect()),
            Lookup::File(file) => Err(Error::NotADirectory(file.full_path().to_string())),
        }
    }

    fn glob(&self, pattern: &str) -> Result<Vec<String>> {
        let compiled = pattern::compile(pattern)?;

        let mut matches: Vec<String> = self
            .root
            .descendants()
            .into_iter()
            .map(Node::full_path)
            .filter(|path| pattern::matches(&compiled, path))
            .map(String::from)
            .collect();

        matches.sort();
        Ok(matches)
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        match self.lookup(path)? {
            Lookup::File(file) => Ok(file.data().to_vec()),
            Lookup::Directory(dir) => Err(Error::IsADirectory(dir.full_path().to_string())),
        }
    }
}

/// An open file from a [`MemoryVault`].
pub struct MemoryFile {
    path: String,
    info: FileInfo,
    data: Bytes,
    position: usize,
    closed: bool,
}

impl MemoryFile {
    fn new(file: &FileNode) -> Self {
        Self {
            path: file.full_path().to_string(),
            info: file.stat(),
            data: file.data().clone(),
            position: 0,
            closed: false,
        }
    }

    /// Check if the file has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Read for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::other(Error::FileClosed(self.path.clone())));
        }

        let remaining = &self.data[self.position..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.position += n;
        Ok(n)
    }
}

impl VaultFile for MemoryFile {
    fn stat(&self) -> Result<FileInfo> {
        Ok(self.info.clone())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
