//! Bootstrap configuration loading
//!
//! The TOML file is optional. Resolution priority used by the server:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Built-in default (fallback)
//!
//! Items 1 and 2 are handled by the server's argument parser; this module
//! owns the TOML layer and the built-in defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default HTTP/WebSocket port
pub const DEFAULT_PORT: u16 = 3000;

/// Default bind address
pub const DEFAULT_BIND: &str = "0.0.0.0";

/// Default directory for static client files
pub const DEFAULT_STATIC_DIR: &str = "public";

/// Default maximum accepted payload (30 MiB)
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 30 * 1024 * 1024;

/// Classifier backends built into the server
pub const KNOWN_BACKENDS: &[&str] = &["whatlang"];

/// Bootstrap configuration loaded from TOML file
///
/// Cannot change while running; restart to pick up edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Listen port
    #[serde(default)]
    pub port: Option<u16>,

    /// Listen address
    #[serde(default)]
    pub bind: Option<String>,

    /// Directory served for non-API paths
    #[serde(default)]
    pub static_dir: Option<PathBuf>,

    /// Maximum size of one inbound payload (WebSocket message or HTTP body)
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Segment filtering rules
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Language classifier selection
    #[serde(default)]
    pub classifier: ClassifierSettings,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Filter pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Segments shorter than this (in characters) are never classified
    pub min_length: usize,
    /// Only this many leading characters are sent to the classifier
    pub classify_prefix_chars: usize,
    /// Label a segment must be classified as to be accepted
    pub target_language: String,
    /// Minimum confidence of the top label; 0.0 accepts on label match alone
    pub min_confidence: f64,
    /// Minimum spacing between emitted events; 0 disables pacing
    pub min_emit_interval_ms: u64,
    /// Payloads producing more segments than this are refused
    pub max_segments: usize,
    /// Wall-clock budget for one run; unset means unbounded
    pub run_timeout_secs: Option<u64>,
}

/// Classifier backend settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    /// Backend name (see [`KNOWN_BACKENDS`])
    pub backend: String,
    /// Restrict detection to these ISO 639-3 codes; empty means all languages
    pub allowlist: Vec<String>,
}

fn default_max_payload_bytes() -> usize {
    DEFAULT_MAX_PAYLOAD_BYTES
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: None,
            bind: None,
            static_dir: None,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            logging: LoggingConfig::default(),
            pipeline: PipelineSettings::default(),
            classifier: ClassifierSettings::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            min_length: 40,
            classify_prefix_chars: 600,
            target_language: "eng".to_string(),
            min_confidence: 0.0,
            min_emit_interval_ms: 0,
            max_segments: 10_000,
            run_timeout_secs: None,
        }
    }
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            backend: "whatlang".to_string(),
            allowlist: Vec::new(),
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load configuration with graceful degradation
    ///
    /// - Explicit path: must exist and parse.
    /// - No explicit path: the platform default location is tried; a missing
    ///   file yields built-in defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            info!("Loading configuration from {}", path.display());
            return Self::load(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                Self::load(&path)
            }
            Some(path) => {
                info!(
                    "No config file at {}, using built-in defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            None => {
                warn!("Could not determine config directory, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let p = &self.pipeline;

        if !(0.0..=1.0).contains(&p.min_confidence) {
            return Err(Error::Config(format!(
                "pipeline.min_confidence must be within 0.0..=1.0, got {}",
                p.min_confidence
            )));
        }
        if p.classify_prefix_chars == 0 {
            return Err(Error::Config(
                "pipeline.classify_prefix_chars must be greater than 0".to_string(),
            ));
        }
        if p.max_segments == 0 {
            return Err(Error::Config(
                "pipeline.max_segments must be greater than 0".to_string(),
            ));
        }
        if p.target_language.trim().is_empty() {
            return Err(Error::Config(
                "pipeline.target_language must not be empty".to_string(),
            ));
        }
        if !KNOWN_BACKENDS.contains(&self.classifier.backend.as_str()) {
            return Err(Error::Config(format!(
                "Unknown classifier backend '{}' (known: {})",
                self.classifier.backend,
                KNOWN_BACKENDS.join(", ")
            )));
        }
        if self.max_payload_bytes == 0 {
            return Err(Error::Config(
                "max_payload_bytes must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Platform config file location: `<config_dir>/prompt-sieve/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("prompt-sieve").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert_eq!(config.port, None);
        assert_eq!(config.max_payload_bytes, DEFAULT_MAX_PAYLOAD_BYTES);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.pipeline, PipelineSettings::default());
        assert_eq!(config.classifier.backend, "whatlang");
    }

    #[test]
    fn test_partial_pipeline_section_keeps_other_defaults() {
        let config = TomlConfig::from_toml_str(
            r#"
            [pipeline]
            min_length = 20
            "#,
        )
        .unwrap();

        assert_eq!(config.pipeline.min_length, 20);
        assert_eq!(config.pipeline.classify_prefix_chars, 600);
        assert_eq!(config.pipeline.target_language, "eng");
    }

    #[test]
    fn test_confidence_out_of_range_rejected() {
        let err = TomlConfig::from_toml_str("[pipeline]\nmin_confidence = 1.5\n").unwrap_err();
        assert!(err.to_string().contains("min_confidence"));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let err = TomlConfig::from_toml_str("[classifier]\nbackend = \"fasttext\"\n").unwrap_err();
        assert!(err.to_string().contains("fasttext"));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = TomlConfig::from_toml_str("port = = 1").unwrap_err();
        assert!(matches!(err, Error::TomlParse(_)));
    }
}
