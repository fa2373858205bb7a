//! Vault selection from explicit configuration.
//!
//! A [`VaultSelector`] picks one backend when it is constructed and then
//! delegates every operation to it. Selection never reads process state on
//! its own: the environment is passed in as an [`Environment`] snapshot.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::local::FilesystemVault;
use crate::provider::{Vault, VaultFile};
use crate::registry::BackendRegistry;
use trove_common::{Error, FileInfo, Result};

/// Selector configuration.
///
/// Candidates are tried in this order: the backend named by the
/// environment variable, the first existing candidate path, then the
/// fallback order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Environment variable whose value names the backend to use.
    pub env_var_name: Option<String>,
    /// Backend names tried in order when nothing else matched.
    pub fallback_order: Vec<String>,
    /// Directories that, when present, are served by a filesystem vault.
    pub candidate_paths: Vec<PathBuf>,
}

impl SelectorConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the environment variable consulted first.
    pub fn with_env_var(mut self, name: impl Into<String>) -> Self {
        self.env_var_name = Some(name.into());
        self
    }

    /// Append a fallback backend name.
    pub fn with_fallback(mut self, name: impl Into<String>) -> Self {
        self.fallback_order.push(name.into());
        self
    }

    /// Append a candidate directory.
    pub fn with_candidate_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.candidate_paths.push(path.into());
        self
    }

    /// Serialize configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// Snapshot of environment variables used for selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the current process environment.
    ///
    /// Variables whose name or value is not valid UTF-8 are skipped.
    pub fn capture() -> Self {
        Self::from_os_vars(std::env::vars_os())
    }

    /// Build a snapshot from raw variables, skipping non UTF-8 pairs.
    pub fn from_os_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let vars = vars
            .into_iter()
            .filter_map(|(name, value)| match (name.into_string(), value.into_string()) {
                (Ok(name), Ok(value)) => Some((name, value)),
                (name, _) => {
                    debug!(var = ?name, "Skipping non UTF-8 environment variable");
                    None
                }
            })
            .collect();
        Self { vars }
    }

    /// Set a variable.
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Get a variable.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(|s| s.as_str())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// A vault that delegates to a backend chosen at construction.
pub struct VaultSelector {
    selected: Arc<dyn Vault>,
}

impl VaultSelector {
    /// Select a backend.
    ///
    /// # Errors
    /// - `NoVaultSelected` if no candidate produced a vault
    pub fn select(
        config: &SelectorConfig,
        registry: &BackendRegistry,
        env: &Environment,
    ) -> Result<Self> {
        if let Some(var) = &config.env_var_name {
            let value = env.get(var).map(str::trim).unwrap_or("");
            if !value.is_empty() {
                if registry.has_backend(value) {
                    info!(var = %var, backend = %value, "Selected vault from environment");
                    return Ok(Self {
                        selected: registry.resolve(value)?,
                    });
                }
                warn!(var = %var, backend = %value, "Environment names unknown backend");
            }
        }

        for path in &config.candidate_paths {
            if path.is_dir() {
                info!(path = %path.display(), "Selected filesystem vault");
                return Ok(Self {
                    selected: Arc::new(FilesystemVault::new(path)),
                });
            }
            debug!(path = %path.display(), "Candidate path not present");
        }

        for name in &config.fallback_order {
            if registry.has_backend(name) {
                info!(backend = %name, "Selected fallback vault");
                return Ok(Self {
                    selected: registry.resolve(name)?,
                });
            }
            warn!(backend = %name, "Fallback backend is not registered");
        }

        Err(Error::NoVaultSelected)
    }

    /// Wrap an already chosen vault.
    pub fn with_vault(vault: Arc<dyn Vault>) -> Self {
        Self { selected: vault }
    }

    /// Get the selected vault.
    pub fn selected(&self) -> &Arc<dyn Vault> {
        &self.selected
    }
}

impl Vault for VaultSelector {
    fn display_name(&self) -> String {
        format!("Vault Selector ({})", self.selected.display_name())
    }

    fn open(&self, path: &str) -> Result<Box<dyn VaultFile>> {
        self.selected.open(path)
    }

    fn stat(&self, path: &str) -> Result<FileInfo> {
        self.selected.stat(path)
    }

    fn read_dir(&self, path: &str) -> Result<Vec<FileInfo>> {
        self.selected.read_dir(path)
    }

    fn glob(&self, pattern: &str) -> Result<Vec<String>> {
        self.selected.glob(pattern)
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        self.selected.read_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> BackendRegistry {
        let mut registry = BackendRegistry::new();
        registry
            .register("usr", Arc::new(FilesystemVault::new("/usr")))
            .unwrap();
        registry
            .register("srv", Arc::new(FilesystemVault::new("/srv")))
            .unwrap();
        registry
    }

    #[test]
    fn test_env_selects_backend() {
        let config = SelectorConfig::new()
            .with_env_var("TROVE_BACKEND")
            .with_fallback("srv");
        let env = Environment::new().with_var("TROVE_BACKEND", " usr ");

        let selector = VaultSelector::select(&config, &registry(), &env).unwrap();
        assert_eq!(
            selector.display_name(),
            "Vault Selector (Filesystem Vault (/usr))"
        );
    }

    #[test]
    fn test_unknown_env_value_falls_through() {
        let config = SelectorConfig::new()
            .with_env_var("TROVE_BACKEND")
            .with_fallback("srv");
        let env: Environment = [("TROVE_BACKEND", "nope")].into_iter().collect();

        let selector = VaultSelector::select(&config, &registry(), &env).unwrap();
        assert_eq!(
            selector.selected().display_name(),
            "Filesystem Vault (/srv)"
        );
    }

    #[test]
    fn test_candidate_path_selected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), [7]).unwrap();

        let config = SelectorConfig::new()
            .with_candidate_path(dir.path().join("missing"))
            .with_candidate_path(dir.path())
            .with_fallback("srv");

        let selector = VaultSelector::select(&config, &registry(), &Environment::new()).unwrap();
        assert_eq!(selector.read_file("a.txt").unwrap(), vec![7]);
        assert_eq!(selector.glob(".").unwrap(), vec!["a.txt"]);
    }

    #[test]
    fn test_fallback_order() {
        let config = SelectorConfig::new()
            .with_fallback("missing")
            .with_fallback("usr")
            .with_fallback("srv");

        let selector = VaultSelector::select(&config, &registry(), &Environment::new()).unwrap();
        assert_eq!(
            selector.selected().display_name(),
            "Filesystem Vault (/usr)"
        );
    }

    #[test]
    fn test_nothing_selected() {
        let config = SelectorConfig::new().with_fallback("missing");
        let result = VaultSelector::select(&config, &registry(), &Environment::new());
        assert!(matches!(result, Err(Error::NoVaultSelected)));
    }

    #[cfg(unix)]
    #[test]
    fn test_environment_skips_non_utf8() {
        use std::os::unix::ffi::OsStringExt;

        let env = Environment::from_os_vars([
            (OsString::from("TROVE_BACKEND"), OsString::from("usr")),
            (OsString::from("BROKEN_VALUE"), OsString::from_vec(b"f\xff".to_vec())),
            (OsString::from_vec(b"BROKEN\xffNAME".to_vec()), OsString::from("x")),
        ]);

        assert_eq!(env.get("TROVE_BACKEND"), Some("usr"));
        assert_eq!(env.get("BROKEN_VALUE"), None);
        assert_eq!(env, Environment::new().with_var("TROVE_BACKEND", "usr"));
    }

    #[test]
    fn test_environment_capture_matches_process() {
        let env = Environment::capture();
        for (name, value) in std::env::vars_os() {
            if let (Some(name), Some(value)) = (name.to_str(), value.to_str()) {
                assert_eq!(env.get(name), Some(value));
            }
        }
    }

    #[test]
    fn test_config_json() {
        let config = SelectorConfig::new()
            .with_env_var("TROVE_BACKEND")
            .with_fallback("memory")
            .with_candidate_path("/opt/assets");

        let json = config.to_json().unwrap();
        assert_eq!(SelectorConfig::from_json(&json).unwrap(), config);

        let partial = SelectorConfig::from_json(r#"{"fallback_order": ["memory"]}"#).unwrap();
        assert_eq!(partial.env_var_name, None);
        assert_eq!(partial.fallback_order, vec!["memory"]);
        assert!(partial.candidate_paths.is_empty());

        assert!(matches!(
            SelectorConfig::from_json("not json"),
            Err(Error::Serialization(_))
        ));
    }
}
