use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::ffprobe::FFProbeData;

/// One audio or subtitle track found by probing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub index: i32,
    pub codec_name: Option<String>,
    pub language: Option<String>,
}

/// Which track list a summary is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Subtitle,
}

/// One input item of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    /// Absolute path of the file on disk
    pub path: PathBuf,
    /// Display filename; may differ from the path after name edits
    pub filename: String,
    /// Duration in seconds, 0.0 until probed
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub audio_tracks: Vec<TrackInfo>,
    #[serde(default)]
    pub subtitle_tracks: Vec<TrackInfo>,
}

impl MediaFile {
    /// Create a media file whose display name is the path's file name
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            path,
            filename,
            duration: 0.0,
            audio_tracks: Vec::new(),
            subtitle_tracks: Vec::new(),
        }
    }

    /// Same file with a different display name
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    /// Stem of the underlying path
    pub fn stem(&self) -> String {
        file_stem(&self.path)
    }

    /// Stem of the display filename
    pub fn display_stem(&self) -> String {
        file_stem(Path::new(&self.filename))
    }

    /// Extension of the underlying path including the leading dot, or ""
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default()
    }

    /// Whether a duration is known
    pub fn has_duration(&self) -> bool {
        self.duration > 0.0
    }

    /// Fill duration and track lists from probe output
    pub fn apply_probe(&mut self, data: &FFProbeData) {
        if let Some(duration) = data.duration_secs() {
            self.duration = duration;
        }
        self.audio_tracks = collect_tracks(data, "audio");
        self.subtitle_tracks = collect_tracks(data, "subtitle");
    }

    /// Human readable summary of a track list.
    ///
    /// Audio lists codec names, subtitles list languages (`und` when untagged).
    pub fn track_summary(&self, kind: TrackKind) -> String {
        match kind {
            TrackKind::Audio if self.audio_tracks.is_empty() => "No Audio".to_string(),
            TrackKind::Audio => self
                .audio_tracks
                .iter()
                .map(|t| t.codec_name.as_deref().unwrap_or("ukn"))
                .collect::<Vec<_>>()
                .join(", "),
            TrackKind::Subtitle if self.subtitle_tracks.is_empty() => "No Subtitles".to_string(),
            TrackKind::Subtitle => self
                .subtitle_tracks
                .iter()
                .map(|t| t.language.as_deref().unwrap_or("und"))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

fn collect_tracks(data: &FFProbeData, codec_type: &str) -> Vec<TrackInfo> {
    data.streams_of(codec_type)
        .map(|s| TrackInfo {
            index: s.index,
            codec_name: s.codec_name.clone(),
            language: s.language().map(str::to_string),
        })
        .collect()
}

/// File stem as an owned string ("" when the path has none)
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}
