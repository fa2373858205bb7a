//! Common utilities and types shared across Trove crates.
//!
//! This module provides the error taxonomy, the vault path model and the
//! file information type used by every vault backend.

pub mod error;
pub mod path;
pub mod types;

pub use error::{Error, Result};
pub use path::{split, VaultPath, ROOT_PATH, SEPARATOR};
pub use types::FileInfo;
