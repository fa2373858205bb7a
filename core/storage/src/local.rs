//! Local filesystem vault.

use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::pattern;
use crate::provider::{Vault, VaultFile};
use crate::walk::walk;
use trove_common::{Error, FileInfo, Result, VaultPath, ROOT_PATH};

/// Vault backed by a directory on the host filesystem.
///
/// All paths are relative to the root directory and validated with the
/// same rules as every other vault.
#[derive(Debug, Clone)]
pub struct FilesystemVault {
    root: PathBuf,
}

impl FilesystemVault {
    /// Create a new filesystem vault rooted at the given directory.
    ///
    /// The directory is not required to exist yet; operations on a missing
    /// root fail with `NotExist`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Get the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Convert a vault path string to a filesystem path.
    fn to_fs_path(&self, path: &str) -> Result<PathBuf> {
        let vault_path = VaultPath::parse(path)?;
        let mut fs_path = self.root.clone();
        for segment in vault_path.segments() {
            fs_path.push(segment);
        }
        Ok(fs_path)
    }

    fn fs_metadata(&self, path: &str, fs_path: &Path) -> Result<fs::Metadata> {
        fs::metadata(fs_path).map_err(|e| map_io_error(e, path))
    }
}

/// Map host I/O errors onto the vault error taxonomy.
fn map_io_error(err: io::Error, path: &str) -> Error {
    match err.kind() {
        io::ErrorKind::NotFound => Error::NotExist(path.to_string()),
        _ => Error::Io(err),
    }
}

/// Create file info from filesystem metadata.
fn create_info(name: &str, fs_meta: &fs::Metadata) -> FileInfo {
    let modified: DateTime<Utc> = fs_meta
        .modified()
        .map(|t| t.into())
        .unwrap_or_else(|_| Utc::now());

    if fs_meta.is_dir() {
        FileInfo::directory(name, modified)
    } else {
        FileInfo::file(name, modified, fs_meta.len())
    }
}

fn base_name(path: &str) -> String {
    VaultPath::parse(path)
        .map(|p| p.name().to_string())
        .unwrap_or_else(|_| ROOT_PATH.to_string())
}

impl Vault for FilesystemVault {
    fn display_name(&self) -> String {
        format!("Filesystem Vault ({})", self.root.display())
    }

    fn open(&self, path: &str) -> Result<Box<dyn VaultFile>> {
        let fs_path = self.to_fs_path(path)?;
        let fs_meta = self.fs_metadata(path, &fs_path)?;
        if fs_meta.is_dir() {
            return Err(Error::IsADirectory(path.to_string()));
        }

        debug!(path = %path, "Opening host file");
        let file = File::open(&fs_path).map_err(|e| map_io_error(e, path))?;

        Ok(Box::new(FilesystemFile {
            path: path.to_string(),
            fs_path,
            file: Some(file),
        }))
    }

    fn stat(&self, path: &str) -> Result<FileInfo> {
        let fs_path = self.to_fs_path(path)?;
        let fs_meta = self.fs_metadata(path, &fs_path)?;
        Ok(create_info(&base_name(path), &fs_meta))
    }

    fn read_dir(&self, path: &str) -> Result<Vec<FileInfo>> {
        let fs_path = self.to_fs_path(path)?;
        let fs_meta = self.fs_metadata(path, &fs_path)?;
        if !fs_meta.is_dir() {
            return Err(Error::NotADirectory(path.to_string()));
        }

        let mut results = Vec::new();
        for entry in fs::read_dir(&fs_path)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            let entry_meta = entry.metadata()?;
            results.push(create_info(&name, &entry_meta));
        }

        results.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(results)
    }

    fn glob(&self, pattern: &str) -> Result<Vec<String>> {
        let compiled = pattern::compile(pattern)?;

        let mut results = Vec::new();
        walk(self, ROOT_PATH, |path, _| {
            if pattern::matches(&compiled, path) {
                results.push(path.to_string());
            }
            Ok(())
        })?;

        results.sort();
        Ok(results)
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let fs_path = self.to_fs_path(path)?;
        let fs_meta = self.fs_metadata(path, &fs_path)?;
        if fs_meta.is_dir() {
            return Err(Error::IsADirectory(path.to_string()));
        }

        fs::read(&fs_path).map_err(|e| map_io_error(e, path))
    }
}

/// An open file from a [`FilesystemVault`].
struct FilesystemFile {
    path: String,
    fs_path: PathBuf,
    file: Option<File>,
}

impl Read for FilesystemFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.file.as_mut() {
            Some(file) => file.read(buf),
            None => Err(io::Error::other(Error::FileClosed(self.path.clone()))),
        }
    }
}

impl VaultFile for FilesystemFile {
    fn stat(&self) -> Result<FileInfo> {
        let fs_meta = fs::metadata(&self.fs_path).map_err(|e| map_io_error(e, &self.path))?;
        Ok(create_info(&base_name(&self.path), &fs_meta))
    }

    fn close(&mut self) -> Result<()> {
        self.file = None;
        Ok(())
    }
}
