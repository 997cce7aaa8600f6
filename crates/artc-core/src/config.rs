//! Workspace configuration
//!
//! Loaded from `artc.toml` when present. Every field has a default, so an
//! empty file (or none at all) is a valid configuration.
//!
//! ```toml
//! state_dir = ".artc"
//! default_approver = "release-lead"
//!
//! [compiler]
//! temperature = 0.0
//! invocation_timeout_ms = 60000
//! max_surrounding_chars = 80
//! ```

use crate::error::ConfigError;
use artc_compiler::CompilerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name looked up in the project root
pub const CONFIG_FILE: &str = "artc.toml";

/// ARTC workspace configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtcConfig {
    /// Project whose files are read and locked
    pub project_root: PathBuf,
    /// Where artifacts, indexes, manifests and the audit log live;
    /// relative paths resolve against `project_root`
    pub state_dir: PathBuf,
    /// Compiler pass settings
    pub compiler: CompilerConfig,
    /// Directory of `<kind>.schema.json` overrides
    pub schema_dir: Option<PathBuf>,
    /// Directory of `<kind>.prompt.md` overrides
    pub prompt_dir: Option<PathBuf>,
    /// Approver recorded when none is given
    pub default_approver: String,
}

impl Default for ArtcConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            state_dir: PathBuf::from(".artc"),
            compiler: CompilerConfig::default(),
            schema_dir: None,
            prompt_dir: None,
            default_approver: "human".to_string(),
        }
    }
}

impl ArtcConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// `Parse` for malformed TOML, then anything [`validate`](Self::validate) rejects
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file
    ///
    /// A relative `project_root` is taken relative to the file's directory.
    ///
    /// # Errors
    /// `Io`, `Parse`, or a validation error
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if config.project_root.is_relative() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            config.project_root = base.join(&config.project_root);
        }
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// `<root>/artc.toml` if it exists, otherwise defaults rooted at `root`
    ///
    /// # Errors
    /// Same as [`load`](Self::load)
    pub fn discover(root: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let root = root.as_ref();
        let candidate = root.join(CONFIG_FILE);
        if candidate.is_file() {
            Self::load(candidate)
        } else {
            Ok(Self::default().with_project_root(root))
        }
    }

    /// With project root
    #[must_use]
    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = root.into();
        self
    }

    /// With state directory
    #[must_use]
    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = dir.into();
        self
    }

    /// With compiler settings
    #[must_use]
    pub fn with_compiler(mut self, compiler: CompilerConfig) -> Self {
        self.compiler = compiler;
        self
    }

    /// With schema override directory
    #[must_use]
    pub fn with_schema_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.schema_dir = Some(dir.into());
        self
    }

    /// With prompt override directory
    #[must_use]
    pub fn with_prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// With default approver
    #[must_use]
    pub fn with_default_approver(mut self, approver: impl Into<String>) -> Self {
        self.default_approver = approver.into();
        self
    }

    /// Check values
    ///
    /// # Errors
    /// `Compiler` for out-of-range compiler settings, `EmptyApprover`
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.compiler.validate()?;
        if self.default_approver.trim().is_empty() {
            return Err(ConfigError::EmptyApprover);
        }
        Ok(())
    }

    /// Resolved state directory
    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        self.project_root.join(&self.state_dir)
    }

    /// Registry index file
    #[must_use]
    pub fn registry_path(&self) -> PathBuf {
        self.state_path().join("registry.json")
    }

    /// Approval ledger file
    #[must_use]
    pub fn approvals_path(&self) -> PathBuf {
        self.state_path().join("approvals.json")
    }

    /// Lock manifest directory
    #[must_use]
    pub fn locks_dir(&self) -> PathBuf {
        self.state_path().join("locks")
    }

    /// Audit log file
    #[must_use]
    pub fn audit_path(&self) -> PathBuf {
        self.state_path().join("audit.jsonl")
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.project_root.join(path)
    }

    /// Resolved schema override directory
    #[must_use]
    pub fn schema_path(&self) -> Option<PathBuf> {
        self.schema_dir.as_deref().map(|p| self.resolve(p))
    }

    /// Resolved prompt override directory
    #[must_use]
    pub fn prompt_path(&self) -> Option<PathBuf> {
        self.prompt_dir.as_deref().map(|p| self.resolve(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn empty_toml_is_the_default() {
        assert_eq!(ArtcConfig::from_toml_str("").unwrap(), ArtcConfig::default());
    }

    #[test]
    fn compiler_table_is_read() {
        let config = ArtcConfig::from_toml_str(
            "default_approver = \"lead\"\n[compiler]\ntemperature = 0.1\ninvocation_timeout_ms = 5000\n",
        )
        .unwrap();
        assert_eq!(config.default_approver, "lead");
        assert_eq!(config.compiler.invocation_timeout, Duration::from_secs(5));
        assert!((config.compiler.temperature - 0.1).abs() < f32::EPSILON);
        assert_eq!(config.compiler.max_surrounding_chars, 80);
    }

    #[test]
    fn hot_temperature_is_rejected() {
        let err = ArtcConfig::from_toml_str("[compiler]\ntemperature = 0.9\n").unwrap_err();
        assert!(matches!(err, ConfigError::Compiler(_)));
    }

    #[test]
    fn blank_approver_is_rejected() {
        assert!(matches!(
            ArtcConfig::new().with_default_approver("  ").validate(),
            Err(ConfigError::EmptyApprover)
        ));
    }

    #[test]
    fn unknown_field_type_is_a_parse_error() {
        assert!(matches!(
            ArtcConfig::from_toml_str("state_dir = 3"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn paths_hang_off_the_state_dir() {
        let config = ArtcConfig::new().with_project_root("/p").with_schema_dir("schemas");
        assert_eq!(config.registry_path(), PathBuf::from("/p/.artc/registry.json"));
        assert_eq!(config.locks_dir(), PathBuf::from("/p/.artc/locks"));
        assert_eq!(config.audit_path(), PathBuf::from("/p/.artc/audit.jsonl"));
        assert_eq!(config.schema_path(), Some(PathBuf::from("/p/schemas")));
    }

    #[test]
    fn discover_loads_file_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "state_dir = \"state\"\n").unwrap();
        let config = ArtcConfig::discover(dir.path()).unwrap();
        assert_eq!(config.state_path(), dir.path().join(".").join("state"));

        let empty = tempfile::tempdir().unwrap();
        let defaults = ArtcConfig::discover(empty.path()).unwrap();
        assert_eq!(defaults.project_root, empty.path());
    }
}
