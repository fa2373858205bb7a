//! Vault backend abstraction for Trove.
//!
//! This module provides the trait-based interface every vault backend
//! implements (in-memory, host filesystem, selector), the traversal and
//! glob helpers shared between backends, and selection of a backend from
//! explicit configuration.
//!
//! # Design Principles
//! - Backend isolation: callers only see the [`Vault`] operation set
//! - Synchronous operations: every call runs to completion on the caller's thread
//! - Unified error semantics: the same condition yields the same error variant

pub mod local;
pub mod pattern;
pub mod provider;
pub mod registry;
pub mod selector;
pub mod walk;

pub use local::FilesystemVault;
pub use provider::{Vault, VaultFile};
pub use registry::BackendRegistry;
pub use selector::{Environment, SelectorConfig, VaultSelector};
pub use walk::{file_paths, walk};
