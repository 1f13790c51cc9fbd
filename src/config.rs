use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path, path::PathBuf, str::FromStr};
use thiserror::Error;

/// Overrides [`SnippetConfig::cache_dir`].
pub const CACHE_DIR_ENV: &str = "BOTEXPR_CACHE_DIR";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to open config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EngineConfig {
    #[serde(default)]
    pub snippet: SnippetConfig,

    #[serde(default)]
    pub interpolation: InterpolationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnippetConfig {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for SnippetConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            enabled: default_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterpolationConfig {
    #[serde(default = "default_escape_char")]
    pub escape_char: char,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            escape_char: default_escape_char(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".botexpr").join("cache"))
        .unwrap_or_else(|| std::env::temp_dir().join("botexpr-cache"))
}

fn default_true() -> bool {
    true
}

fn default_escape_char() -> char {
    '\\'
}

impl EngineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(dir) = std::env::var_os(CACHE_DIR_ENV) {
            self.snippet.cache_dir = PathBuf::from(dir);
        }
        self
    }

    /// Reads `path` when given, otherwise starts from defaults, then applies the
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(config.with_env_overrides())
    }
}

impl FromStr for EngineConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(serde_json::from_str(s)?)
    }
}
