use std::path::Path;
use std::collections::HashMap;
use anyhow::{Context, Result};
use serde::Deserialize;
use crate::config::EngineConfig;
use tokio::process::Command;

/// Complete ffprobe output structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FFProbeData {
    #[serde(default)]
    pub streams: Vec<FFProbeStream>,
    #[serde(default)]
    pub format: FFProbeFormat,
}

/// Format-level metadata from ffprobe
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FFProbeFormat {
    #[serde(rename = "format_name")]
    pub format_name: Option<String>,
    /// Duration in seconds, as ffprobe prints it ("1422.080000")
    pub duration: Option<String>,
    #[serde(rename = "bit_rate")]
    pub bit_rate: Option<String>,
    pub tags: Option<HashMap<String, String>>,
}

/// Stream-level metadata from ffprobe
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FFProbeStream {
    pub index: i32,
    #[serde(rename = "codec_type")]
    pub codec_type: Option<String>,
    #[serde(rename = "codec_name")]
    pub codec_name: Option<String>,
    pub tags: Option<HashMap<String, String>>,
    pub disposition: Option<HashMap<String, i32>>,
}

impl FFProbeData {
    /// Parse the JSON document printed by `ffprobe -print_format json`
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse ffprobe JSON")
    }

    /// Container duration in seconds, if ffprobe reported a usable one
    pub fn duration_secs(&self) -> Option<f64> {
        self.format
            .duration
            .as_deref()
            .and_then(|d| d.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0)
    }

    /// Streams of one codec type ("audio", "video", "subtitle")
    pub fn streams_of<'a>(&'a self, codec_type: &'a str) -> impl Iterator<Item = &'a FFProbeStream> + 'a {
        self.streams
            .iter()
            .filter(move |s| s.codec_type.as_deref() == Some(codec_type))
    }
}

impl FFProbeStream {
    /// The stream's `language` tag, if present
    pub fn language(&self) -> Option<&str> {
        self.tags
            .as_ref()
            .and_then(|t| t.get("language"))
            .map(|s| s.as_str())
    }
}

/// Run ffprobe on a file and parse the JSON output
pub async fn probe_file(cfg: &EngineConfig, file_path: &Path) -> Result<FFProbeData> {
    use log::debug;

    // Verify file exists before trying to probe
    if !file_path.exists() {
        anyhow::bail!("File does not exist: {}", file_path.display());
    }

    let ffprobe_bin = cfg.ffprobe_path();
    debug!("ffprobe: probing {} with {}", file_path.display(), ffprobe_bin.display());

    let output = Command::new(&ffprobe_bin)
        .arg("-v")
        .arg("error")
        .arg("-print_format")
        .arg("json")
        .arg("-show_streams")
        .arg("-show_format")
        .arg(file_path)
        .output()
        .await
        .with_context(|| format!(
            "Failed to execute ffprobe for: {}. Ensure ffprobe is installed and accessible at: {}",
            file_path.display(),
            ffprobe_bin.display()
        ))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let exit_code = output.status.code().unwrap_or(-1);
        anyhow::bail!(
            "ffprobe failed (exit code {}) for {}:\nSTDERR: {}",
            exit_code,
            file_path.display(),
            stderr
        );
    }

    // ffprobe can emit non-UTF-8 tag values; keep what we can
    let json_str = String::from_utf8_lossy(&output.stdout);

    FFProbeData::from_json(&json_str)
        .with_context(|| format!("Failed to parse ffprobe JSON for: {}", file_path.display()))
}
