//! Configuration loading and root folder resolution
//!
//! Resolution priority for every setting that can come from more than one place:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`VSHELF_*`)
//! 3. TOML config file (`~/.config/vshelf/config.toml`)
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable TOML file is never fatal: a warning is logged and
//! compiled defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "VSHELF_ROOT_FOLDER";

/// Environment variable holding a comma-separated credential pool
pub const API_KEYS_ENV: &str = "VSHELF_API_KEYS";

/// Environment variable pointing at an alternate TOML file
pub const CONFIG_PATH_ENV: &str = "VSHELF_CONFIG";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "vshelf.db";

/// Compiled defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub bind_address: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let root_folder = dirs::data_local_dir()
            .map(|d| d.join("vshelf"))
            .unwrap_or_else(|| PathBuf::from("./vshelf_data"));

        Self {
            root_folder,
            log_level: "info".to_string(),
            bind_address: "127.0.0.1:5740".to_string(),
        }
    }
}

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the database
    #[serde(default)]
    pub root_folder: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub ingest: IngestSettings,
    #[serde(default)]
    pub server: ServerConfig,
}

/// `[logging]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `[generation]` section: external generation endpoint and retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// REST base URL of the generation service
    pub base_url: String,
    /// Credential pool. Prefer `VSHELF_API_KEYS` over storing keys here.
    pub api_keys: Vec<String>,
    /// Models accepted for text/JSON generation; any may be picked on any attempt
    pub text_models: Vec<String>,
    /// Models accepted for embedding generation
    pub embedding_models: Vec<String>,
    /// Attempt budget per call
    pub max_attempts: u32,
    /// Wait after a rate-limit/quota failure
    pub rate_limit_backoff_ms: u64,
    /// Wait after any other failure
    pub error_backoff_ms: u64,
    /// Process-wide outbound request ceiling
    pub requests_per_second: u32,
    /// Expected embedding length; 0 accepts any length
    pub embedding_dimension: usize,
    /// Per-request HTTP timeout
    pub request_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_keys: Vec::new(),
            text_models: vec![
                "gemini-2.0-flash".to_string(),
                "gemini-1.5-flash".to_string(),
                "gemini-1.5-pro".to_string(),
            ],
            embedding_models: vec!["text-embedding-004".to_string()],
            max_attempts: 6,
            rate_limit_backoff_ms: 2000,
            error_backoff_ms: 1000,
            requests_per_second: 10,
            embedding_dimension: 768,
            request_timeout_secs: 60,
        }
    }
}

/// `[ingest]` section: pipeline tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Floor for a segment's weight in the video centroid, in seconds
    pub min_segment_weight_secs: f64,
    /// Assumed speaking rate used to estimate video duration from transcript length
    pub chars_per_second: f64,
    /// Concurrent embedding calls per video
    pub embed_concurrency: usize,
    /// Transcript prefix length sent to the classifier
    pub classifier_transcript_chars: usize,
    /// Minimum similarity for guide matching
    pub guide_threshold: f32,
    /// Delay between videos during backfill
    pub backfill_delay_ms: u64,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            min_segment_weight_secs: 10.0,
            chars_per_second: 15.0,
            embed_concurrency: 4,
            classifier_transcript_chars: 30_000,
            guide_threshold: 0.8,
            backfill_delay_ms: 2000,
        }
    }
}

/// `[server]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: CompiledDefaults::for_current_platform().bind_address,
        }
    }
}

/// Default TOML location: `$VSHELF_CONFIG`, else `<config dir>/vshelf/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    dirs::config_dir().map(|d| d.join("vshelf").join("config.toml"))
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))
}

/// Load the TOML config, falling back to defaults when missing or invalid
pub fn load_or_default(path: Option<&Path>) -> TomlConfig {
    let Some(path) = path else {
        warn!("No config directory available, using compiled defaults");
        return TomlConfig::default();
    };

    if !path.exists() {
        info!("Config file {} not found, using compiled defaults", path.display());
        return TomlConfig::default();
    }

    match load_toml_config(path) {
        Ok(config) => {
            info!("Loaded config from {}", path.display());
            config
        }
        Err(e) => {
            warn!("{}; using compiled defaults", e);
            TomlConfig::default()
        }
    }
}

/// Write a TOML config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Root folder resolution (CLI → ENV → TOML → compiled default)
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            cli_arg: None,
            toml_root: None,
        }
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml(mut self, config: &TomlConfig) -> Self {
        self.toml_root = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            info!(module = %self.module_name, "Root folder from command line: {}", path.display());
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                info!(module = %self.module_name, "Root folder from {}: {}", ROOT_FOLDER_ENV, path);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_root {
            info!(module = %self.module_name, "Root folder from TOML: {}", path.display());
            return path.clone();
        }

        let default = CompiledDefaults::for_current_platform().root_folder;
        info!(module = %self.module_name, "Root folder from compiled default: {}", default.display());
        default
    }
}

/// Creates the root folder and locates the database inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }
}

/// Validate credential (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Resolve the credential pool: environment first, then TOML
pub fn resolve_api_keys(generation: &GenerationConfig) -> Result<Vec<String>> {
    let env_keys: Vec<String> = std::env::var(API_KEYS_ENV)
        .map(|raw| parse_key_list(&raw))
        .unwrap_or_default();

    let toml_keys: Vec<String> = generation
        .api_keys
        .iter()
        .filter(|k| is_valid_key(k))
        .map(|k| k.trim().to_string())
        .collect();

    if !env_keys.is_empty() && !toml_keys.is_empty() {
        warn!(
            "Credentials found in both {} and TOML. Using environment (highest priority).",
            API_KEYS_ENV
        );
    }

    if !env_keys.is_empty() {
        info!(count = env_keys.len(), "Credential pool loaded from environment");
        return Ok(env_keys);
    }

    if !toml_keys.is_empty() {
        info!(count = toml_keys.len(), "Credential pool loaded from TOML config");
        return Ok(toml_keys);
    }

    Err(Error::Config(format!(
        "No generation credentials configured. Set {}=key1,key2 or add \
         api_keys = [\"...\"] under [generation] in the TOML config",
        API_KEYS_ENV
    )))
}

fn parse_key_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| is_valid_key(k))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_list_skips_blanks() {
        assert_eq!(parse_key_list(" a , ,b,"), vec!["a".to_string(), "b".to_string()]);
        assert!(parse_key_list("  ").is_empty());
    }

    #[test]
    fn test_generation_defaults() {
        let config = GenerationConfig::default();
        assert_eq!(config.max_attempts, 6);
        assert_eq!(config.rate_limit_backoff_ms, 2000);
        assert_eq!(config.error_backoff_ms, 1000);
        assert!(!config.text_models.is_empty());
        assert!(!config.embedding_models.is_empty());
    }

    #[test]
    fn test_ingest_defaults() {
        let settings = IngestSettings::default();
        assert_eq!(settings.min_segment_weight_secs, 10.0);
        assert!(settings.embed_concurrency >= 1);
    }
}
