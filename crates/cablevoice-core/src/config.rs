//! Startup configuration loaded from a TOML file.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working setup that targets the Virtual Audio Cable "Line 1" device.

use crate::error::{CableVoiceError, CableVoiceResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// How triggers reach the playback engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PipelineMode {
    /// Producers enqueue artifacts for a single playback consumer
    #[default]
    Queued,
    /// One request at a time runs synthesis and playback on its own worker
    Inline,
}

/// Settings for the remote speech service
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Base URL of the translate_tts endpoint
    pub endpoint: String,
    /// HTTP timeout for each chunk request
    pub request_timeout_secs: u64,
    /// Request the slower speaking rate
    pub slow: bool,
    /// Longest text fragment sent in one request
    pub max_chunk_chars: usize,
    /// Longest text accepted for one synthesis request
    pub max_text_length: usize,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            endpoint: crate::DEFAULT_TTS_ENDPOINT.to_string(),
            request_timeout_secs: 10,
            slow: false,
            max_chunk_chars: crate::DEFAULT_CHUNK_CHARS,
            max_text_length: crate::MAX_TEXT_LENGTH,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
        }
    }
}

impl SynthesisConfig {
    /// Request timeout as a duration
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Settings for the work queue and temporary artifacts
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of synthesized artifacts that may wait for playback
    pub queue_capacity: usize,
    /// How long shutdown waits for the playback consumer to drain
    pub shutdown_timeout_ms: u64,
    /// Directory for temporary audio files (platform temp dir when unset)
    pub temp_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 8,
            shutdown_timeout_ms: 2_000,
            temp_dir: None,
        }
    }
}

impl PipelineConfig {
    /// Shutdown bound as a duration
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Directory temporary artifacts are written to
    #[must_use]
    pub fn artifact_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Top-level Cablevoice configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CableVoiceConfig {
    /// Substring of the cable device name, matched case-insensitively
    pub device_name: String,
    /// Explicit device index, bypassing the name search
    pub device_index: Option<usize>,
    /// Speech language code passed to the synthesizer
    pub language: String,
    /// Also play cable-routed speech on the default output
    pub monitor_default_output: bool,
    /// Queued or inline triggering
    pub mode: PipelineMode,
    /// Remote speech service settings
    pub synthesis: SynthesisConfig,
    /// Queue and temp file settings
    pub pipeline: PipelineConfig,
}

impl Default for CableVoiceConfig {
    fn default() -> Self {
        Self {
            device_name: crate::DEFAULT_DEVICE_NAME.to_string(),
            device_index: None,
            language: crate::DEFAULT_LANGUAGE.to_string(),
            monitor_default_output: false,
            mode: PipelineMode::default(),
            synthesis: SynthesisConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl CableVoiceConfig {
    /// Parse a configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or fails validation
    pub fn from_toml_str(text: &str) -> CableVoiceResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load<P: AsRef<Path>>(path: P) -> CableVoiceResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CableVoiceError::configuration(format!("Failed to read {}: {e}", path.display()))
        })?;
        info!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&text)
    }

    /// Load `path` if given, else the per-user config file if it exists, else defaults
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed
    pub fn load_or_default(path: Option<&Path>) -> CableVoiceResult<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(default) if default.exists() => Self::load(default),
            _ => {
                debug!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Per-user configuration file location
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "cablevoice")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid value
    pub fn validate(&self) -> CableVoiceResult<()> {
        if self.device_index.is_none() && self.device_name.trim().is_empty() {
            return Err(CableVoiceError::configuration(
                "device_name must not be empty when device_index is unset",
            ));
        }
        if self.language.trim().is_empty() {
            return Err(CableVoiceError::configuration("language must not be empty"));
        }
        if self.synthesis.endpoint.trim().is_empty() {
            return Err(CableVoiceError::configuration("synthesis.endpoint must not be empty"));
        }
        if self.synthesis.max_chunk_chars == 0 {
            return Err(CableVoiceError::configuration(
                "synthesis.max_chunk_chars must be greater than 0",
            ));
        }
        if self.pipeline.queue_capacity == 0 {
            return Err(CableVoiceError::configuration(
                "pipeline.queue_capacity must be greater than 0",
            ));
        }
        Ok(())
    }
}
