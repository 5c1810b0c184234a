//! Configuration file support for blogsmith.
//!
//! This module reads and writes the TOML file layered under environment
//! overrides by [`super::load_config`].
//!
//! # Configuration File Format
//!
//! ```toml
//! [model]
//! path = "models/llama-2-7b-chat.Q8_0.gguf"
//! tokenizer_path = "models/tokenizer.json"
//! download_url = "https://example.com/llama-2-7b-chat.Q8_0.gguf"
//! sha256 = "..."
//!
//! [generation]
//! temperature = 0.01
//! seed = 299792458
//! tokens_per_word = 2
//! max_tokens_cap = 512
//! timeout_secs = 300
//!
//! [export]
//! output_dir = "."
//! file_name = "blog_output.pdf"
//! font = "Helvetica"
//! font_size = 12.0
//! row_height_mm = 10.0
//! bottom_margin_mm = 15.0
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

use super::Config;
use std::path::Path;

/// A configuration file on disk
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConfigFile {
    pub config: Config,
}

impl ConfigFile {
    /// Wrap an existing configuration
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigFileError> {
        toml::to_string_pretty(&self.config).map_err(|e| ConfigFileError::Serialize(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories.
    ///
    /// Refuses to replace an existing file unless `overwrite` is set.
    pub fn save(&self, path: &Path, overwrite: bool) -> Result<(), ConfigFileError> {
        if path.exists() && !overwrite {
            return Err(ConfigFileError::AlreadyExists(path.display().to_string()));
        }

        let content = self.to_toml()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigFileError::Io(e.to_string()))?;
        }

        std::fs::write(path, content).map_err(|e| ConfigFileError::Io(e.to_string()))
    }
}

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialize error: {0}")]
    Serialize(String),

    #[error("Config file already exists: {0} (use --force to overwrite)")]
    AlreadyExists(String),
}
