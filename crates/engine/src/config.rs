use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Template used when neither the job nor the config provides one
pub const DEFAULT_RENAME_TEMPLATE: &str = "{name} - S{season:02d}E{episode:02d} - {title}{ext}";

/// Engine configuration, passed in explicitly when a job is spawned
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Path to the ffmpeg binary
    pub ffmpeg_bin: PathBuf,
    /// Path to the ffprobe binary (derived from ffmpeg_bin when omitted)
    pub ffprobe_bin: Option<PathBuf>,
    /// Extra (name, code) language pairs on top of the built-in table
    pub custom_languages: Vec<(String, String)>,
    /// Default template for rename jobs
    pub rename_template: String,
    /// Seconds a cancelled transcoder gets to quit before it is killed
    pub terminate_grace_secs: u64,
    /// Number of trailing diagnostic lines kept for failure reports
    pub diagnostic_tail_lines: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl EngineConfig {
    /// Create a default configuration with sensible values
    pub fn default_config() -> Self {
        Self {
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            ffprobe_bin: None,
            custom_languages: Vec::new(),
            rename_template: DEFAULT_RENAME_TEMPLATE.to_string(),
            terminate_grace_secs: 5,
            diagnostic_tail_lines: 50,
        }
    }

    /// Load configuration from a file, or return defaults if path is None or file doesn't exist
    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default_config();

        if let Some(config_path) = path {
            if config_path.exists() {
                let content = std::fs::read_to_string(config_path)
                    .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

                // TOML by extension, JSON otherwise
                if config_path.extension().and_then(|s| s.to_str()) == Some("toml") {
                    config = toml::from_str(&content)
                        .with_context(|| format!("Failed to parse TOML config: {}", config_path.display()))?;
                } else {
                    config = serde_json::from_str(&content)
                        .with_context(|| format!("Failed to parse JSON config: {}", config_path.display()))?;
                }
            }
        }

        Ok(config)
    }

    /// The ffprobe binary to use.
    ///
    /// An explicit `ffprobe_bin` wins; otherwise ffprobe is expected next to a
    /// non-bare `ffmpeg_bin`, falling back to `ffprobe` on the PATH.
    pub fn ffprobe_path(&self) -> PathBuf {
        if let Some(ref explicit) = self.ffprobe_bin {
            return explicit.clone();
        }
        match self.ffmpeg_bin.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join("ffprobe"),
            _ => PathBuf::from("ffprobe"),
        }
    }

    /// ffmpeg binary as the first element of an argument vector
    pub fn ffmpeg_program(&self) -> String {
        self.ffmpeg_bin.to_string_lossy().to_string()
    }
}
