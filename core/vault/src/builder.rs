//! Builds memory vaults from host files.
//!
//! A [`MemoryBuilder`] collects host files matched by glob patterns into a
//! [`MemoryVault`] and writes the result either as a raw archive or as a
//! Rust source file embedding the archive.

use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::fs;
use std::io::Write;
use std::path::{Component, Path};
use tracing::{debug, info};

use crate::memory::{FileOptions, MemoryVault};
use trove_common::{Error, Result, SEPARATOR};

/// Bytes per line in the rendered archive literal.
const BYTES_PER_LINE: usize = 16;

/// Builder options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuilderOptions {
    /// Give the rendered loader `pub` visibility instead of `pub(crate)`.
    pub export_loader: bool,
}

impl BuilderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_export_loader(mut self, export_loader: bool) -> Self {
        self.export_loader = export_loader;
        self
    }
}

/// Collects host files into a memory vault.
#[derive(Debug, Default)]
pub struct MemoryBuilder {
    vault: MemoryVault,
    options: BuilderOptions,
}

impl MemoryBuilder {
    /// Create a builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder with the given options.
    pub fn with_options(options: BuilderOptions) -> Self {
        Self {
            vault: MemoryVault::new(),
            options,
        }
    }

    /// Get the vault built so far.
    pub fn vault(&self) -> &MemoryVault {
        &self.vault
    }

    /// Consume the builder and return the vault.
    pub fn into_vault(self) -> MemoryVault {
        self.vault
    }

    /// Add every host file matching `globs` below `root`.
    ///
    /// Each file is stored at its path relative to `root` with its host
    /// modification time. Matched directories are skipped.
    ///
    /// # Errors
    /// - `InvalidInput` if a glob contains `..` or a path is not valid UTF-8
    /// - `IllegalPattern` if a glob is malformed
    /// - `Io` if a matched file cannot be read
    pub fn include(&mut self, root: impl AsRef<Path>, globs: &[String]) -> Result<()> {
        let root = root.as_ref();
        let root_str = root
            .to_str()
            .ok_or_else(|| Error::InvalidInput(format!("root is not valid UTF-8: {}", root.display())))?;

        for pattern in globs {
            if pattern.contains("..") {
                return Err(Error::InvalidInput(format!(
                    "glob cannot contain '..': {}",
                    pattern
                )));
            }

            let full_pattern = join_pattern(root_str, pattern);
            debug!(pattern = %full_pattern, "Expanding glob");

            let matches = glob::glob(&full_pattern)
                .map_err(|e| Error::IllegalPattern(format!("{}: {}", pattern, e.msg)))?;

            for entry in matches {
                let host_path = entry.map_err(|e| Error::Io(e.into()))?;
                let metadata = fs::metadata(&host_path)?;
                if metadata.is_dir() {
                    debug!(path = %host_path.display(), "Skipping directory");
                    continue;
                }

                let path = vault_path(root, &host_path)?;
                let data = fs::read(&host_path)?;
                let modified: DateTime<Utc> = metadata.modified()?.into();

                self.vault.write_file(
                    &path,
                    data.as_slice(),
                    FileOptions::new().with_modified(modified),
                )?;
                info!(path = %path, size = data.len(), "Added file");
            }
        }

        Ok(())
    }

    /// Write the vault as a compressed archive.
    pub fn write_binary(&self, writer: &mut impl Write) -> Result<()> {
        let data = self.vault.to_archive()?;
        writer.write_all(&data)?;
        Ok(())
    }

    /// Write a Rust source file embedding the vault.
    ///
    /// The file declares a `TROVE_VAULT_<NAME>` byte slice holding the
    /// archive and a `load_vault_<name>()` function decoding it.
    ///
    /// # Errors
    /// - `InvalidInput` if `vault_name` has no identifier characters
    pub fn write_loader(&self, vault_name: &str, writer: &mut impl Write) -> Result<()> {
        let ident = sanitize_ident(vault_name)?;
        let data = self.vault.to_archive()?;
        let source = render_loader(&ident, &data, self.options.export_loader);
        writer.write_all(source.as_bytes())?;
        Ok(())
    }
}

/// Join a glob onto a root directory, escaping the root.
fn join_pattern(root: &str, pattern: &str) -> String {
    let base = glob::Pattern::escape(root);
    if base.is_empty() {
        pattern.to_string()
    } else if base.ends_with(SEPARATOR) {
        format!("{}{}", base, pattern)
    } else {
        format!("{}{}{}", base, SEPARATOR, pattern)
    }
}

/// Vault path of a host file relative to `root`.
fn vault_path(root: &Path, host_path: &Path) -> Result<String> {
    let relative = host_path.strip_prefix(root).map_err(|_| {
        Error::InvalidInput(format!(
            "{} is not below {}",
            host_path.display(),
            root.display()
        ))
    })?;

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => {
                let segment = segment.to_str().ok_or_else(|| {
                    Error::InvalidInput(format!("path is not valid UTF-8: {}", host_path.display()))
                })?;
                segments.push(segment);
            }
            Component::CurDir => {}
            _ => {
                return Err(Error::InvalidInput(format!(
                    "unexpected path component in {}",
                    host_path.display()
                )));
            }
        }
    }

    Ok(segments.join(SEPARATOR))
}

/// Turn a vault name into a lowercase identifier fragment.
fn sanitize_ident(name: &str) -> Result<String> {
    let ident: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();

    if !ident.chars().any(|c| c.is_ascii_alphanumeric()) {
        return Err(Error::InvalidInput(format!("invalid vault name: {:?}", name)));
    }
    Ok(ident)
}

fn render_loader(ident: &str, data: &[u8], export: bool) -> String {
    let visibility = if export { "pub" } else { "pub(crate)" };
    let static_name = format!("TROVE_VAULT_{}", ident.to_ascii_uppercase());

    let mut source = String::new();
    source.push_str("// Code generated by trove. DO NOT EDIT.\n\n");

    let _ = writeln!(source, "{} static {}: &[u8] = &[", visibility, static_name);
    for chunk in data.chunks(BYTES_PER_LINE) {
        let line: Vec<String> = chunk.iter().map(|b| format!("0x{:02x}", b)).collect();
        let _ = writeln!(source, "    {},", line.join(", "));
    }
    source.push_str("];\n\n");

    let _ = writeln!(
        source,
        "{} fn load_vault_{}() -> trove_common::Result<trove_vault::MemoryVault> {{",
        visibility, ident
    );
    let _ = writeln!(source, "    trove_vault::MemoryVault::from_archive({})", static_name);
    source.push_str("}\n");
    source
}

#[cfg(test)]
mod tests {
    use super::*;
    use trove_storage::Vault;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("assets/img")).unwrap();
        fs::write(dir.path().join("assets/a.txt"), b"alpha").unwrap();
        fs::write(dir.path().join("assets/b.md"), b"beta").unwrap();
        fs::write(dir.path().join("assets/img/logo.png"), [0x89, 0x50]).unwrap();
        dir
    }

    fn globs(patterns: &[&str]) -> Vec<String> {
        patterns.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_include_relative_to_root() {
        let dir = fixture();
        let mut builder = MemoryBuilder::new();
        builder
            .include(dir.path(), &globs(&["assets/*", "assets/img/*"]))
            .unwrap();

        let vault = builder.vault();
        assert_eq!(vault.read_file("assets/a.txt").unwrap(), b"alpha");
        assert_eq!(vault.read_file("assets/b.md").unwrap(), b"beta");
        assert_eq!(vault.read_file("assets/img/logo.png").unwrap(), vec![0x89, 0x50]);
        assert_eq!(vault.file_count(), 3);
    }

    #[test]
    fn test_include_keeps_host_mtime() {
        let dir = fixture();
        let host_modified: DateTime<Utc> = fs::metadata(dir.path().join("assets/a.txt"))
            .unwrap()
            .modified()
            .unwrap()
            .into();

        let mut builder = MemoryBuilder::new();
        builder.include(dir.path(), &globs(&["assets/*.txt"])).unwrap();

        let info = builder.vault().stat("assets/a.txt").unwrap();
        assert_eq!(info.modified, host_modified);
        assert!(matches!(
            builder.vault().stat("assets/b.md"),
            Err(Error::NotExist(_))
        ));
    }

    #[test]
    fn test_include_rejects_parent_segments() {
        let dir = fixture();
        let mut builder = MemoryBuilder::new();
        let result = builder.include(dir.path().join("assets"), &globs(&["../*"]));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_include_illegal_pattern() {
        let dir = fixture();
        let mut builder = MemoryBuilder::new();
        let result = builder.include(dir.path(), &globs(&["assets/[a"]));
        assert!(matches!(result, Err(Error::IllegalPattern(_))));
    }

    #[test]
    fn test_include_no_matches() {
        let dir = fixture();
        let mut builder = MemoryBuilder::new();
        builder.include(dir.path(), &globs(&["nothing/*"])).unwrap();
        assert_eq!(builder.into_vault().file_count(), 0);
    }

    #[test]
    fn test_write_binary() {
        let dir = fixture();
        let mut builder = MemoryBuilder::new();
        builder.include(dir.path(), &globs(&["assets/*"])).unwrap();

        let mut out = Vec::new();
        builder.write_binary(&mut out).unwrap();

        let decoded = MemoryVault::from_archive(&out).unwrap();
        assert_eq!(decoded.glob("assets/*").unwrap(), vec!["assets/a.txt", "assets/b.md"]);
        assert_eq!(decoded.read_file("assets/b.md").unwrap(), b"beta");
    }

    #[test]
    fn test_write_loader() {
        let dir = fixture();
        let mut builder = MemoryBuilder::new();
        builder.include(dir.path(), &globs(&["assets/a.txt"])).unwrap();

        let mut out = Vec::new();
        builder.write_loader("My-Assets", &mut out).unwrap();
        let source = String::from_utf8(out).unwrap();

        assert!(source.starts_with("// Code generated by trove. DO NOT EDIT."));
        assert!(source.contains("pub(crate) static TROVE_VAULT_MY_ASSETS: &[u8] = &["));
        assert!(source.contains("    0x1f, 0x8b,"));
        assert!(source.contains(
            "pub(crate) fn load_vault_my_assets() -> trove_common::Result<trove_vault::MemoryVault> {"
        ));
        assert!(source.contains("trove_vault::MemoryVault::from_archive(TROVE_VAULT_MY_ASSETS)"));
    }

    #[test]
    fn test_write_loader_exported() {
        let builder = MemoryBuilder::with_options(BuilderOptions::new().with_export_loader(true));

        let mut out = Vec::new();
        builder.write_loader("static", &mut out).unwrap();
        let source = String::from_utf8(out).unwrap();

        assert!(source.contains("pub static TROVE_VAULT_STATIC"));
        assert!(source.contains("pub fn load_vault_static()"));
    }

    #[test]
    fn test_write_loader_invalid_name() {
        let builder = MemoryBuilder::new();
        let mut out = Vec::new();
        assert!(matches!(
            builder.write_loader(" -- ", &mut out),
            Err(Error::InvalidInput(_))
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn test_join_pattern() {
        assert_eq!(join_pattern("", "*.txt"), "*.txt");
        assert_eq!(join_pattern("/srv/", "*.txt"), "/srv/*.txt");
        assert_eq!(join_pattern("/srv", "a/*"), "/srv/a/*");
        assert_eq!(join_pattern("/srv/[x]", "*"), "/srv/[[]x[]]/*");
    }

    #[test]
    fn test_sanitize_ident() {
        assert_eq!(sanitize_ident("assets").unwrap(), "assets");
        assert_eq!(sanitize_ident("My Assets.v2").unwrap(), "my_assets_v2");
        assert!(sanitize_ident("").is_err());
    }
}
