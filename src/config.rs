//! Runtime configuration.
//!
//! Values come from, lowest to highest priority: built-in defaults, a TOML
//! file, `MINDCHECK_*` environment variables, then command-line flags
//! (applied by the binary).

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::games::GameKind;

pub const ENV_DATA_DIR: &str = "MINDCHECK_DATA_DIR";
pub const ENV_BIND: &str = "MINDCHECK_BIND";

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ConfigError
{
    #[error("Failed to read configuration file {path}")]
    #[diagnostic(code(mindcheck::config::read_failed))]
    ReadFailed
    {
        path: PathBuf,
        #[source]
        cause: std::io::Error,
    },

    #[error("Failed to parse configuration file {path}")]
    #[diagnostic(
        code(mindcheck::config::parse_failed),
        help("Check the file against the documented keys")
    )]
    ParseFailed
    {
        path: PathBuf,
        #[source]
        cause: toml::de::Error,
    },

    #[error("No data directory available on this platform")]
    #[diagnostic(
        code(mindcheck::config::no_data_dir),
        help("Set MINDCHECK_DATA_DIR or pass --data-dir")
    )]
    NoDataDir,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct StorageKeys
{
    pub kohs: String,
    pub digit_span: String,
    pub puzzle: String,
    pub trace: String,
    pub pass_along: String,
    pub profile: String,
}

impl Default for StorageKeys
{
    fn default() -> Self
    {
        Self {
            kohs: "KohsTest".to_string(),
            digit_span: "MemoryTest".to_string(),
            puzzle: "PictureConstructionTest".to_string(),
            trace: "PatternTest".to_string(),
            pass_along: "PassAlongTest".to_string(),
            profile: "userDetails".to_string(),
        }
    }
}

impl StorageKeys
{
    pub fn for_game(&self, kind: GameKind) -> &str
    {
        match kind {
            GameKind::Kohs => &self.kohs,
            GameKind::DigitSpan => &self.digit_span,
            GameKind::Puzzle => &self.puzzle,
            GameKind::Trace => &self.trace,
            GameKind::PassAlong => &self.pass_along,
        }
    }

    pub fn games(&self) -> [&str; 5]
    {
        [
            self.kohs.as_str(),
            self.digit_span.as_str(),
            self.puzzle.as_str(),
            self.trace.as_str(),
            self.pass_along.as_str(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig
{
    /// Root for sessions, logs and submissions. `None` means the platform
    /// data directory.
    pub data_dir: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub reference_image: Option<PathBuf>,
    pub submissions_dir: Option<PathBuf>,
    pub digit_display_ms: Option<u64>,
    pub storage_keys: StorageKeys,
}

pub const DEFAULT_BIND: &str = "127.0.0.1:5000";
pub const DEFAULT_DIGIT_DISPLAY_MS: u64 = 3000;

impl AppConfig
{
    pub fn load(path: &Path) -> Result<Self, ConfigError>
    {
        let content = fs::read_to_string(path).map_err(|cause| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            cause,
        })?;
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, ConfigError>
    {
        toml::from_str(content).map_err(|cause| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            cause,
        })
    }

    /// Reads `path` when given, otherwise the default location if it exists,
    /// otherwise the built-in defaults. Environment overrides apply last.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError>
    {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::load(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self)
    {
        if let Ok(dir) = env::var(ENV_DATA_DIR) {
            if !dir.trim().is_empty() {
                self.data_dir = Some(PathBuf::from(dir));
            }
        }
        if let Ok(bind) = env::var(ENV_BIND) {
            if !bind.trim().is_empty() {
                self.bind_address = Some(bind);
            }
        }
    }

    pub fn data_dir(&self) -> Result<PathBuf, ConfigError>
    {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::data_local_dir()
                .map(|dir| dir.join("mindcheck"))
                .ok_or(ConfigError::NoDataDir),
        }
    }

    pub fn session_dir(&self) -> Result<PathBuf, ConfigError>
    {
        Ok(self.data_dir()?.join("sessions"))
    }

    pub fn log_dir(&self) -> Result<PathBuf, ConfigError>
    {
        self.data_dir()
    }

    pub fn reference_image(&self) -> Result<PathBuf, ConfigError>
    {
        match &self.reference_image {
            Some(path) => Ok(path.clone()),
            None => Ok(self.data_dir()?.join("reference.png")),
        }
    }

    pub fn submissions_dir(&self) -> Result<PathBuf, ConfigError>
    {
        match &self.submissions_dir {
            Some(path) => Ok(path.clone()),
            None => Ok(self.data_dir()?.join("submissions")),
        }
    }

    pub fn bind_address(&self) -> &str
    {
        self.bind_address.as_deref().unwrap_or(DEFAULT_BIND)
    }

    pub fn digit_display(&self) -> Duration
    {
        Duration::from_millis(self.digit_display_ms.unwrap_or(DEFAULT_DIGIT_DISPLAY_MS))
    }
}

pub fn default_config_path() -> Option<PathBuf>
{
    dirs::config_dir().map(|dir| dir.join("mindcheck").join("config.toml"))
}

#[cfg(test)]
mod tests
{
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults()
    {
        let config = AppConfig::default();
        assert_eq!(config.bind_address(), "127.0.0.1:5000");
        assert_eq!(config.digit_display(), Duration::from_millis(3000));
        assert_eq!(config.storage_keys.for_game(GameKind::Trace), "PatternTest");
        assert_eq!(config.storage_keys.profile, "userDetails");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults()
    {
        let content = r#"
data_dir = "/tmp/mindcheck-test"
digit_display_ms = 1500

[storage_keys]
kohs = "BlocksV2"
"#;
        let config = AppConfig::parse(content, Path::new("config.toml")).unwrap();
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/tmp/mindcheck-test"));
        assert_eq!(
            config.session_dir().unwrap(),
            PathBuf::from("/tmp/mindcheck-test/sessions")
        );
        assert_eq!(
            config.reference_image().unwrap(),
            PathBuf::from("/tmp/mindcheck-test/reference.png")
        );
        assert_eq!(config.digit_display(), Duration::from_millis(1500));
        assert_eq!(config.storage_keys.kohs, "BlocksV2");
        assert_eq!(config.storage_keys.digit_span, "MemoryTest");
        assert_eq!(config.bind_address(), DEFAULT_BIND);
    }

    #[test]
    fn test_parse_error_names_the_file()
    {
        let err = AppConfig::parse("data_dir = [", Path::new("broken.toml")).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_missing_file_is_read_error()
    {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFailed { .. }));
    }
}
