//! In-memory node tree.
//!
//! The tree is made of directory and file nodes. Directories own their
//! children exclusively, keyed by name. Children are unordered; callers
//! that need a stable order use [`DirNode::sorted_children`].

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use trove_common::path::{is_root_segments, validate_segments};
use trove_common::{Error, FileInfo, Result, ROOT_PATH, SEPARATOR};

/// Type of tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    File,
    Directory,
}

/// Base name of a full path.
fn base_name(full_path: &str) -> &str {
    full_path.rsplit(SEPARATOR).next().unwrap_or(full_path)
}

/// A directory node.
#[derive(Debug, Clone)]
pub struct DirNode {
    full_path: String,
    name: String,
    modified: DateTime<Utc>,
    children: HashMap<String, Node>,
}

impl DirNode {
    /// Create a new empty directory.
    pub fn new(full_path: impl Into<String>, modified: DateTime<Utc>) -> Self {
        let full_path = full_path.into();
        Self {
            name: base_name(&full_path).to_string(),
            full_path,
            modified,
            children: HashMap::new(),
        }
    }

    /// Create a new root directory.
    pub fn root() -> Self {
        Self::new(ROOT_PATH, Utc::now())
    }

    /// Check if this is the root directory.
    pub fn is_root(&self) -> bool {
        self.full_path == ROOT_PATH
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    pub fn modified(&self) -> DateTime<Utc> {
        self.modified
    }

    /// Get information about this directory.
    pub fn stat(&self) -> FileInfo {
        FileInfo::directory(&self.name, self.modified)
    }

    /// Get child by name.
    pub fn get_child(&self, name: &str) -> Option<&Node> {
        self.children.get(name)
    }

    /// Iterate over children in no particular order.
    pub fn children(&self) -> impl Iterator<Item = &Node> {
        self.children.values()
    }

    /// Children ordered by name ascending.
    pub fn sorted_children(&self) -> Vec<&Node> {
        let mut children: Vec<&Node> = self.children.values().collect();
        children.sort_by(|a, b| a.name().cmp(b.name()));
        children
    }

    /// Navigate to a node below this directory by path segments.
    ///
    /// Empty segments or the root token return `None`, naming this
    /// directory itself.
    ///
    /// # Errors
    /// - Invalid segments
    /// - `NotExist` if a segment is missing
    /// - `NotADirectory` when the path continues below a file
    pub fn get_descendant(&self, segments: &[String]) -> Result<Option<&Node>> {
        if is_root_segments(segments) {
            return Ok(None);
        }
        validate_segments(segments)?;

        let missing = || Error::NotExist(segments.join(SEPARATOR));
        let (first, rest) = segments.split_first().ok_or(Error::EmptyPath)?;
        let mut current = self.children.get(first).ok_or_else(missing)?;
        for segment in rest {
            current = match current {
                Node::Directory(dir) => dir.get_child(segment).ok_or_else(missing)?,
                Node::File(file) => return Err(file.descend_error()),
            };
        }

        Ok(Some(current))
    }

    /// Every node below this directory, depth first.
    ///
    /// A directory's contents come before the directory itself.
    pub fn descendants(&self) -> Vec<&Node> {
        let mut nodes = Vec::new();
        self.collect_descendants(&mut nodes);
        nodes
    }

    fn collect_descendants<'a>(&'a self, nodes: &mut Vec<&'a Node>) {
        for child in self.children.values() {
            if let Node::Directory(dir) = child {
                dir.collect_descendants(nodes);
            }
            nodes.push(child);
        }
    }

    /// Count the total number of files below this directory.
    pub fn file_count(&self) -> usize {
        self.children
            .values()
            .map(|child| match child {
                Node::File(_) => 1,
                Node::Directory(dir) => dir.file_count(),
            })
            .sum()
    }

    /// Get the total size of all files below this directory.
    pub fn total_size(&self) -> u64 {
        self.children
            .values()
            .map(|child| match child {
                Node::File(file) => file.size(),
                Node::Directory(dir) => dir.total_size(),
            })
            .sum()
    }

    /// Full path of a descendant given its segments relative to this directory.
    fn descendant_path(&self, relative: &[String]) -> String {
        let relative = relative.join(SEPARATOR);
        if self.is_root() {
            relative
        } else {
            format!("{}{}{}", self.full_path, SEPARATOR, relative)
        }
    }

    /// Check that `parents` can be walked or created without mutation failing.
    ///
    /// Returns the deepest parent if every segment already exists.
    fn check_parents(&self, parents: &[String]) -> Result<Option<&DirNode>> {
        let mut current = self;
        for segment in parents {
            match current.children.get(segment) {
                None => return Ok(None),
                Some(Node::Directory(dir)) => current = dir,
                Some(Node::File(file)) => {
                    return Err(Error::NotADirectory(file.full_path.clone()));
                }
            }
        }
        Ok(Some(current))
    }

    /// Walk `parents`, creating every missing directory.
    fn vivify(&mut self, parents: &[String]) -> Result<&mut DirNode> {
        let base = self.full_path.clone();
        let is_root = self.is_root();
        let mut current = self;
        for (idx, segment) in parents.iter().enumerate() {
            let child = current.children.entry(segment.clone()).or_insert_with(|| {
                let relative = parents[..=idx].join(SEPARATOR);
                let full_path = if is_root {
                    relative
                } else {
                    format!("{}{}{}", base, SEPARATOR, relative)
                };
                Node::Directory(DirNode::new(full_path, Utc::now()))
            });
            current = match child {
                Node::Directory(dir) => dir,
                Node::File(file) => return Err(Error::NotADirectory(file.full_path.clone())),
            };
        }
        Ok(current)
    }

    /// Insert a node at a path below this directory.
    ///
    /// Missing intermediate directories are created. The tree is left
    /// unmodified when the call fails.
    ///
    /// # Errors
    /// - Invalid segments
    /// - `NotADirectory` if an intermediate segment names a file
    /// - `AlreadyExists` if a node already exists at the path
    pub fn create_node(&mut self, segments: &[String], node: Node) -> Result<()> {
        validate_segments(segments)?;
        let (last, parents) = segments.split_last().ok_or(Error::EmptyPath)?;

        if let Some(parent) = self.check_parents(parents)? {
            if parent.children.contains_key(last) {
                return Err(Error::AlreadyExists(self.descendant_path(segments)));
            }
        }

        let parent = self.vivify(parents)?;
        parent.children.insert(last.clone(), node);
        Ok(())
    }

    /// Create or replace a file at a path below this directory.
    ///
    /// Missing intermediate directories are created. The tree is left
    /// unmodified when the call fails.
    ///
    /// # Errors
    /// - Invalid segments
    /// - `NotADirectory` if an intermediate segment names a file
    /// - `IsADirectory` if a directory exists at the path
    pub fn put_file(&mut self, segments: &[String], file: FileNode) -> Result<()> {
        validate_segments(segments)?;
        let (last, parents) = segments.split_last().ok_or(Error::EmptyPath)?;

        if let Some(parent) = self.check_parents(parents)? {
            if let Some(Node::Directory(dir)) = parent.children.get(last) {
                return Err(Error::IsADirectory(dir.full_path.clone()));
            }
        }

        let parent = self.vivify(parents)?;
        parent.children.insert(last.clone(), Node::File(file));
        Ok(())
    }
}

/// A file node holding an immutable payload.
#[derive(Debug, Clone)]
pub struct FileNode {
    full_path: String,
    name: String,
    modified: DateTime<Utc>,
    data: Bytes,
}

impl FileNode {
    /// Create a new file with a private copy of `data`.
    pub fn new(full_path: impl Into<String>, data: &[u8], modified: DateTime<Utc>) -> Self {
        Self::from_bytes(full_path, Bytes::copy_from_slice(data), modified)
    }

    /// Create a new file taking ownership of `data`.
    pub fn from_bytes(full_path: impl Into<String>, data: Bytes, modified: DateTime<Utc>) -> Self {
        let full_path = full_path.into();
        Self {
            name: base_name(&full_path).to_string(),
            full_path,
            modified,
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    pub fn modified(&self) -> DateTime<Utc> {
        self.modified
    }

    /// Get the payload.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Get information about this file.
    pub fn stat(&self) -> FileInfo {
        FileInfo::file(&self.name, self.modified, self.size())
    }

    fn descend_error(&self) -> Error {
        Error::NotADirectory(format!("cannot descend into file {}", self.full_path))
    }
}

/// A node in the vault tree.
#[derive(Debug, Clone)]
pub enum Node {
    Directory(DirNode),
    File(FileNode),
}

impl Node {
    pub fn node_type(&self) -> NodeType {
        match self {
            Node::Directory(_) => NodeType::Directory,
            Node::File(_) => NodeType::File,
        }
    }

    /// Check if this is a file.
    pub fn is_file(&self) -> bool {
        self.node_type() == NodeType::File
    }

    /// Check if this is a directory.
    pub fn is_directory(&self) -> bool {
        self.node_type() == NodeType::Directory
    }

    pub fn name(&self) -> &str {
        match self {
            Node::Directory(dir) => dir.name(),
            Node::File(file) => file.name(),
        }
    }

    pub fn full_path(&self) -> &str {
        match self {
            Node::Directory(dir) => dir.full_path(),
            Node::File(file) => file.full_path(),
        }
    }

    pub fn modified(&self) -> DateTime<Utc> {
        match self {
            Node::Directory(dir) => dir.modified(),
            Node::File(file) => file.modified(),
        }
    }

    /// Get information about this node.
    pub fn stat(&self) -> FileInfo {
        match self {
            Node::Directory(dir) => dir.stat(),
            Node::File(file) => file.stat(),
        }
    }

    /// Navigate to a node by path segments relative to this node.
    ///
    /// Empty segments or the root token return this node.
    ///
    /// # Errors
    /// - Invalid segments
    /// - `NotExist` if a segment is missing
    /// - `NotADirectory` when the path continues below a file
    pub fn get_node(&self, segments: &[String]) -> Result<&Node> {
        match self {
            Node::Directory(dir) => Ok(dir.get_descendant(segments)?.unwrap_or(self)),
            Node::File(file) => {
                if is_root_segments(segments) {
                    return Ok(self);
                }
                validate_segments(segments)?;
                Err(file.descend_error())
            }
        }
    }
}
