//! Configuration management.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables prefixed with `BLOGSMITH_` (nested keys use `__`,
//! e.g. `BLOGSMITH_MODEL__PATH`).

mod file_config;

pub use file_config::{ConfigFile, ConfigFileError};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "BLOGSMITH";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Model artifact location
    #[serde(default)]
    pub model: ModelConfig,

    /// Decoding and token budget settings
    #[serde(default)]
    pub generation: GenerationConfig,

    /// PDF export settings
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the quantized model lives and how to fetch it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Path to the GGUF weights
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Path to `tokenizer.json` (defaults to a file beside the weights)
    #[serde(default)]
    pub tokenizer_path: Option<PathBuf>,

    /// URL to download the weights from when they are missing
    #[serde(default)]
    pub download_url: Option<String>,

    /// Expected SHA-256 of the downloaded weights (hex)
    #[serde(default)]
    pub sha256: Option<String>,
}

impl ModelConfig {
    /// Resolve the tokenizer location for the configured model
    pub fn resolved_tokenizer_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.tokenizer_path {
            return Some(path.clone());
        }
        self.path.as_ref().map(|model| {
            model
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join("tokenizer.json")
        })
    }
}

/// Decoding configuration and token budget heuristic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Sampling temperature (near zero for deterministic output)
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Seed for the sampler
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Estimated tokens per requested word
    #[serde(default = "default_tokens_per_word")]
    pub tokens_per_word: usize,

    /// Upper bound on generated tokens
    #[serde(default = "default_max_tokens_cap")]
    pub max_tokens_cap: usize,

    /// Optional deadline for a single generation
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            seed: default_seed(),
            tokens_per_word: default_tokens_per_word(),
            max_tokens_cap: default_max_tokens_cap(),
            timeout_secs: None,
        }
    }
}

fn default_temperature() -> f64 {
    0.01
}

fn default_seed() -> u64 {
    299_792_458
}

fn default_tokens_per_word() -> usize {
    2
}

fn default_max_tokens_cap() -> usize {
    512
}

/// PDF export configuration. Lengths are in millimetres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory the artifact is written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Artifact file name
    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Standard Type1 font name
    #[serde(default = "default_font")]
    pub font: String,

    /// Font size in points
    #[serde(default = "default_font_size")]
    pub font_size: f32,

    /// Height of one text row
    #[serde(default = "default_row_height")]
    pub row_height_mm: f32,

    /// Distance from the page bottom that triggers a page break
    #[serde(default = "default_bottom_margin")]
    pub bottom_margin_mm: f32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            file_name: default_file_name(),
            font: default_font(),
            font_size: default_font_size(),
            row_height_mm: default_row_height(),
            bottom_margin_mm: default_bottom_margin(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_file_name() -> String {
    crate::export::DEFAULT_FILE_NAME.to_string()
}

fn default_font() -> String {
    "Helvetica".to_string()
}

fn default_font_size() -> f32 {
    12.0
}

fn default_row_height() -> f32 {
    10.0
}

fn default_bottom_margin() -> f32 {
    15.0
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `json` for structured output, anything else for human-readable
    #[serde(default)]
    pub format: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format
            .as_deref()
            .is_some_and(|f| f.eq_ignore_ascii_case("json"))
    }
}

/// Load configuration from an optional file plus environment overrides
pub fn load_config(path: Option<&Path>) -> Result<Config, config::ConfigError> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize()
}

/// Get the configuration from environment variables and defaults only
pub fn get_config() -> Result<Config, config::ConfigError> {
    load_config(None)
}

/// Find a configuration file in the default locations.
///
/// Checks `./blogsmith.toml` first, then `<config dir>/blogsmith/config.toml`.
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("blogsmith.toml");
    if local.is_file() {
        return Some(local);
    }

    default_config_path().filter(|path| path.is_file())
}

/// The per-user configuration file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("blogsmith").join("config.toml"))
}
