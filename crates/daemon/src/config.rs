// Local configuration for the daemon.
//
// Config file: `~/.claude/plots/annotator.toml` (optional; defaults apply when absent).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8888;
pub const CONFIG_FILE_NAME: &str = "annotator.toml";

/// Default persistence directory: `~/.claude/plots/`.
pub fn default_plots_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".claude").join("plots"))
}

/// Path to the config file: `~/.claude/plots/annotator.toml`.
pub fn config_path() -> Option<PathBuf> {
    default_plots_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

// ── Daemon config ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    /// Directory holding the slot files and metadata history.
    /// Defaults to `~/.claude/plots`.
    pub plots_dir: Option<PathBuf>,
    /// Loopback port to listen on.
    pub port: u16,
    /// Largest request body accepted (images arrive base64 encoded).
    pub max_body_bytes: usize,
    pub search: SearchConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            plots_dir: None,
            port: DEFAULT_PORT,
            max_body_bytes: crate::api::DEFAULT_MAX_BODY_BYTES,
            search: SearchConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Load from `~/.claude/plots/annotator.toml`. A missing file yields the
    /// defaults; an unparseable one is logged and also yields the defaults.
    pub fn load() -> Self {
        let Some(path) = config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "ignoring unreadable config");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn resolved_plots_dir(&self) -> Result<PathBuf, ConfigError> {
        self.plots_dir.clone().or_else(default_plots_dir).ok_or(ConfigError::NoHomeDir)
    }
}

// ── Search config ──────────────────────────────────────────────────

/// Which implementation backs the text and path searches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchBackend {
    /// In-process directory walk.
    #[default]
    Native,
    /// Shell out to `grep -r` and `find`.
    Process,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    /// Home directory to search under. Defaults to the user's home.
    pub home_dir: Option<PathBuf>,
    /// Secondary storage mount searched before home when locating files.
    pub secondary_root: PathBuf,
    /// Directory names under home and the secondary mount that usually hold projects.
    pub conventional_dirs: Vec<String>,
    /// Entries whose presence marks a directory as a project root.
    pub project_markers: Vec<String>,
    /// Extension (without dot) of the scripts that produce plots.
    pub script_extension: String,
    /// Script matches under a path component containing one of these are ignored.
    pub excluded_segments: Vec<String>,
    pub script_timeout_secs: u64,
    pub file_timeout_secs: u64,
    pub backend: SearchBackend,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            home_dir: None,
            secondary_root: PathBuf::from("/media/tofunori/Data"),
            conventional_dirs: ["Github", "Projects", "Code", "Dev"].map(String::from).to_vec(),
            project_markers: [".git", "pyproject.toml"].map(String::from).to_vec(),
            script_extension: "py".into(),
            excluded_segments: ["venv", "__pycache__"].map(String::from).to_vec(),
            script_timeout_secs: 10,
            file_timeout_secs: 30,
            backend: SearchBackend::Native,
        }
    }
}

impl SearchConfig {
    pub fn resolved_home(&self) -> Option<PathBuf> {
        self.home_dir.clone().or_else(dirs::home_dir)
    }

    pub fn script_timeout(&self) -> Duration {
        Duration::from_secs(self.script_timeout_secs)
    }

    pub fn file_timeout(&self) -> Duration {
        Duration::from_secs(self.file_timeout_secs)
    }
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("could not determine home directory")]
    NoHomeDir,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_local_conventions() {
        let cfg = DaemonConfig::default();
        assert_eq!(cfg.port, 8888);
        assert!(cfg.plots_dir.is_none());
        assert_eq!(cfg.search.conventional_dirs, vec!["Github", "Projects", "Code", "Dev"]);
        assert_eq!(cfg.search.project_markers, vec![".git", "pyproject.toml"]);
        assert_eq!(cfg.search.script_extension, "py");
        assert_eq!(cfg.search.script_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.search.file_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.search.backend, SearchBackend::Native);
    }

    #[test]
    fn roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("annotator.toml");

        let cfg = DaemonConfig {
            plots_dir: Some(dir.path().join("plots")),
            port: 9999,
            max_body_bytes: 1024,
            search: SearchConfig {
                home_dir: Some("/home/someone".into()),
                backend: SearchBackend::Process,
                ..SearchConfig::default()
            },
        };
        cfg.save_to(&path).unwrap();
        let loaded = DaemonConfig::load_from(&path).unwrap();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let toml_str = r#"
port = 9000

[search]
secondary_root = "/mnt/archive"
backend = "process"
"#;
        let cfg: DaemonConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.search.secondary_root, PathBuf::from("/mnt/archive"));
        assert_eq!(cfg.search.backend, SearchBackend::Process);
        assert_eq!(cfg.search.script_extension, "py"); // default
        assert_eq!(cfg.max_body_bytes, DaemonConfig::default().max_body_bytes);
    }

    #[test]
    fn empty_toml_is_default() {
        let cfg: DaemonConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, DaemonConfig::default());
    }

    #[test]
    fn load_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(DaemonConfig::load_from(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn explicit_plots_dir_wins() {
        let cfg = DaemonConfig { plots_dir: Some("/srv/plots".into()), ..DaemonConfig::default() };
        assert_eq!(cfg.resolved_plots_dir().unwrap(), PathBuf::from("/srv/plots"));
    }
}
