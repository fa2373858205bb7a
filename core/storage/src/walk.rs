//! Recursive traversal over any vault.

use trove_common::{FileInfo, Result, ROOT_PATH, SEPARATOR};

use crate::provider::Vault;

/// Visit every entry below `root`, depth first.
///
/// Entries of a directory are visited in name order. A directory's contents
/// are visited before the directory itself. Paths passed to `visit` are full
/// vault paths; the root token is never prefixed onto them.
///
/// # Errors
/// - Any error from the vault while listing directories
/// - The first error returned by `visit`, which stops the walk
pub fn walk<F>(vault: &dyn Vault, root: &str, mut visit: F) -> Result<()>
where
    F: FnMut(&str, &FileInfo) -> Result<()>,
{
    walk_recursive(vault, root, &mut visit)
}

fn walk_recursive<F>(vault: &dyn Vault, path: &str, visit: &mut F) -> Result<()>
where
    F: FnMut(&str, &FileInfo) -> Result<()>,
{
    for info in vault.read_dir(path)? {
        let full_path = if path == ROOT_PATH {
            info.name.clone()
        } else {
            format!("{}{}{}", path, SEPARATOR, info.name)
        };

        if info.is_dir {
            walk_recursive(vault, &full_path, visit)?;
        }

        visit(&full_path, &info)?;
    }

    Ok(())
}

/// Collect the paths of every file (not directory) below `root`.
pub fn file_paths(vault: &dyn Vault, root: &str) -> Result<Vec<String>> {
    let mut paths = Vec::new();
    walk(vault, root, |path, info| {
        if !info.is_dir {
            paths.push(path.to_string());
        }
        Ok(())
    })?;
    Ok(paths)
}
