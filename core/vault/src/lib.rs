//! In-memory vault engine for Trove.
//!
//! This module provides:
//! - The node tree holding files and directories in memory
//! - [`MemoryVault`], the read/write facade over the tree
//! - The archive codec that persists a vault as one compressed blob
//! - [`MemoryBuilder`] for packing host files into a vault
//!
//! # Architecture
//! The vault sits on top of the backend traits from `trove-storage`, so a
//! memory vault can be used anywhere a filesystem vault can.

pub mod archive;
pub mod builder;
pub mod memory;
pub mod node;

pub use builder::{BuilderOptions, MemoryBuilder};
pub use memory::{FileOptions, MemoryFile, MemoryVault};
pub use node::{DirNode, FileNode, Node, NodeType};
