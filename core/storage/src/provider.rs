//! Vault trait definition.

use std::io::Read;

use trove_common::{FileInfo, Result};

/// An open, sequentially readable file from a vault.
pub trait VaultFile: Read + Send {
    /// Get information about the open file.
    fn stat(&self) -> Result<FileInfo>;

    /// Close the file.
    ///
    /// # Postconditions
    /// - Subsequent reads fail
    fn close(&mut self) -> Result<()>;
}

/// Read-only filesystem operations shared by every vault backend.
///
/// All paths are relative, `/`-separated vault paths; `.` addresses the
/// vault root. Backends must report the same error variants for the same
/// conditions so that a selector can substitute one for another.
pub trait Vault: Send + Sync {
    /// Human readable name of the backend (e.g. "Memory Vault").
    fn display_name(&self) -> String;

    /// Open a file for sequential reading.
    ///
    /// # Errors
    /// - Invalid path
    /// - `NotExist` if nothing is at the path
    /// - `IsADirectory` if the path names a directory
    fn open(&self, path: &str) -> Result<Box<dyn VaultFile>>;

    /// Get information about a file or directory.
    ///
    /// # Errors
    /// - Invalid path
    /// - `NotExist` if nothing is at the path
    fn stat(&self, path: &str) -> Result<FileInfo>;

    /// List a directory, sorted by name ascending.
    ///
    /// # Errors
    /// - Invalid path
    /// - `NotExist` if nothing is at the path
    /// - `NotADirectory` if the path names a file
    fn read_dir(&self, path: &str) -> Result<Vec<FileInfo>>;

    /// Find every path matching a shell-style pattern, sorted.
    ///
    /// # Errors
    /// - `IllegalPattern` for malformed patterns or patterns with backslashes
    fn glob(&self, pattern: &str) -> Result<Vec<String>>;

    /// Read a whole file.
    ///
    /// Fails under the same conditions as [`Vault::open`].
    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let mut file = self.open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        file.close()?;
        Ok(data)
    }
}
