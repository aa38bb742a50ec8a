use std::path::PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::command::BuildCommand;
use crate::companion::Companion;
use crate::error::JobError;
use crate::media::MediaFile;

/// Audio container/codec requested for extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Aac,
    Mp3,
    Flac,
    Ogg,
}

impl AudioFormat {
    /// Encoder passed to `-acodec`.
    ///
    /// AAC is always re-encoded: stream-copy is only valid when the source
    /// audio is already AAC.
    pub fn encoder(&self) -> &'static str {
        match self {
            AudioFormat::Aac => "aac",
            AudioFormat::Mp3 => "libmp3lame",
            AudioFormat::Flac => "flac",
            AudioFormat::Ogg => "libvorbis",
        }
    }

    /// Output file extension, without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Aac => "aac",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Flac => "flac",
            AudioFormat::Ogg => "ogg",
        }
    }
}

/// Soft (separate, toggleable track) or hard (burned into video) subtitles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleMode {
    #[default]
    #[serde(alias = "Soft Subtitles (Toggleable)")]
    Soft,
    #[serde(alias = "Hard Subtitles (Burned-in)")]
    Hard,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractSettings {
    pub format: AudioFormat,
}

/// Companion list as it arrives from a caller: either paths with languages
/// inline, or bare paths plus a parallel `languages` list.
struct RawCompanions {
    files: Vec<CompanionEntry>,
    languages: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum CompanionEntry {
    Path(PathBuf),
    Full(Companion),
}

impl RawCompanions {
    fn into_companions(self) -> Vec<Companion> {
        let mut languages = self.languages.into_iter();
        self.files
            .into_iter()
            .map(|entry| {
                let parallel = languages.next().filter(|l| !l.is_empty());
                match entry {
                    CompanionEntry::Path(path) => Companion { path, language: parallel },
                    CompanionEntry::Full(mut c) => {
                        if c.language.is_none() {
                            c.language = parallel;
                        }
                        c
                    }
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct RawMergeSettings {
    audio_files: Vec<CompanionEntry>,
    languages: Vec<String>,
    preserve_original: bool,
}

impl Default for RawMergeSettings {
    fn default() -> Self {
        Self { audio_files: Vec::new(), languages: Vec::new(), preserve_original: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "RawMergeSettings")]
pub struct MergeSettings {
    /// Candidate audio companions, matched per video at run time
    pub audio_files: Vec<Companion>,
    /// Keep the original non-audio streams (and drop the original audio)
    pub preserve_original: bool,
}

impl From<RawMergeSettings> for MergeSettings {
    fn from(raw: RawMergeSettings) -> Self {
        let audio_files = RawCompanions { files: raw.audio_files, languages: raw.languages }.into_companions();
        Self { audio_files, preserve_original: raw.preserve_original }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawEmbedSettings {
    subtitle_files: Vec<CompanionEntry>,
    languages: Vec<String>,
    subtitle_type: SubtitleMode,
    default_subtitle: bool,
    subtitle_codec: Option<String>,
}

/// Text codec used for soft subtitles; Matroska accepts SubRip
pub const DEFAULT_SUBTITLE_CODEC: &str = "srt";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "RawEmbedSettings")]
pub struct EmbedSettings {
    pub subtitle_files: Vec<Companion>,
    pub subtitle_type: SubtitleMode,
    /// Mark the first new subtitle stream as the default track
    pub default_subtitle: bool,
    pub subtitle_codec: String,
}

impl From<RawEmbedSettings> for EmbedSettings {
    fn from(raw: RawEmbedSettings) -> Self {
        let subtitle_files = RawCompanions { files: raw.subtitle_files, languages: raw.languages }.into_companions();
        Self {
            subtitle_files,
            subtitle_type: raw.subtitle_type,
            default_subtitle: raw.default_subtitle,
            subtitle_codec: raw.subtitle_codec.unwrap_or_else(|| DEFAULT_SUBTITLE_CODEC.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenameSettings {
    pub show_name: String,
    /// Template override; the engine config's template is used when unset
    pub filename_template: Option<String>,
    /// Ask the episode-title collaborator for `{title}`
    pub use_api: bool,
    /// Compute names without touching the filesystem
    pub preview_mode: bool,
}

impl Default for RenameSettings {
    fn default() -> Self {
        Self {
            show_name: "Unknown Show".to_string(),
            filename_template: None,
            use_api: false,
            preview_mode: false,
        }
    }
}

/// What a job does, with the settings that kind understands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum JobKind {
    Extract(ExtractSettings),
    Merge(MergeSettings),
    Embed(EmbedSettings),
    Rename(RenameSettings),
}

impl JobKind {
    /// Build a job kind from its name and a free-form settings map.
    ///
    /// Unrecognised keys are ignored; recognised keys with the wrong shape
    /// are rejected.
    pub fn from_settings(kind: &str, settings: &serde_json::Map<String, serde_json::Value>) -> Result<Self, JobError> {
        let value = serde_json::Value::Object(settings.clone());
        let invalid = |source| JobError::InvalidSettings { kind: kind.to_string(), source };
        match kind {
            "extract" => serde_json::from_value(value).map(JobKind::Extract).map_err(invalid),
            "merge" => serde_json::from_value(value).map(JobKind::Merge).map_err(invalid),
            "embed" => serde_json::from_value(value).map(JobKind::Embed).map_err(invalid),
            "rename" => serde_json::from_value(value).map(JobKind::Rename).map_err(invalid),
            other => Err(JobError::UnknownKind(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            JobKind::Extract(_) => "extract",
            JobKind::Merge(_) => "merge",
            JobKind::Embed(_) => "embed",
            JobKind::Rename(_) => "rename",
        }
    }

    /// Companion candidates for kinds that pair each video with other files
    pub fn companion_pool(&self) -> Option<&[Companion]> {
        match self {
            JobKind::Merge(s) => Some(s.audio_files.as_slice()),
            JobKind::Embed(s) => Some(s.subtitle_files.as_slice()),
            JobKind::Extract(_) | JobKind::Rename(_) => None,
        }
    }

    /// The command builder for kinds that run the transcoder
    pub fn command_builder(&self) -> Option<&dyn BuildCommand> {
        match self {
            JobKind::Extract(s) => Some(s as &dyn BuildCommand),
            JobKind::Merge(s) => Some(s as &dyn BuildCommand),
            JobKind::Embed(s) => Some(s as &dyn BuildCommand),
            JobKind::Rename(_) => None,
        }
    }

    pub fn needs_output_directory(&self) -> bool {
        !matches!(self, JobKind::Rename(_))
    }

    /// Status line announcing work on one file
    pub(crate) fn step_status(&self, position: usize, total: usize, filename: &str) -> String {
        match self {
            JobKind::Extract(_) => format!("({}/{}) Extracting from {}...", position, total, filename),
            JobKind::Merge(_) => format!("({}/{}) Merging audio into {}...", position, total, filename),
            JobKind::Embed(_) => format!("({}/{}) Embedding subtitles in {}...", position, total, filename),
            JobKind::Rename(_) => format!("Processing {}", filename),
        }
    }

    /// Status line when a video has no companions
    pub(crate) fn no_match_status(&self, filename: &str) -> String {
        match self {
            JobKind::Embed(_) => format!("No matching subtitles found for {}", filename),
            _ => format!("No matching audio found for {}", filename),
        }
    }

    pub(crate) fn failure_message(&self, filename: &str) -> String {
        match self {
            JobKind::Extract(_) => format!("Failed to extract from {}", filename),
            JobKind::Merge(_) => format!("Failed to merge audio for {}", filename),
            JobKind::Embed(_) => format!("Failed to embed subtitles for {}", filename),
            JobKind::Rename(_) => format!("Failed to rename {}", filename),
        }
    }

    pub(crate) fn completion_message(&self) -> &'static str {
        match self {
            JobKind::Extract(_) => "Audio extraction completed!",
            JobKind::Merge(_) => "Audio merging completed!",
            JobKind::Embed(_) => "Subtitle embedding completed!",
            JobKind::Rename(_) => "Bulk renaming completed!",
        }
    }
}

/// One batch-level unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub id: Uuid,
    pub input_files: Vec<MediaFile>,
    /// Required for extract/merge/embed, unused for rename
    pub output_directory: Option<PathBuf>,
    pub kind: JobKind,
}

impl ProcessingJob {
    pub fn new(input_files: Vec<MediaFile>, output_directory: Option<PathBuf>, kind: JobKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            input_files,
            output_directory,
            kind,
        }
    }

    /// Check the invariants that must hold before the job starts running
    pub fn validate(&self) -> Result<(), JobError> {
        if self.input_files.is_empty() {
            return Err(JobError::NoInputFiles);
        }
        if self.kind.needs_output_directory() && self.output_directory.is_none() {
            return Err(JobError::MissingOutputDirectory(self.kind.name()));
        }
        Ok(())
    }
}

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Cancelled | JobState::Failed)
    }

    /// Whether moving to `next` is a legal transition.
    ///
    /// Every job passes through `Running`, including one that fails validation.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        match self {
            JobState::Idle => next == JobState::Running,
            JobState::Running => next.is_terminal(),
            _ => false,
        }
    }
}

/// Diagnostics for a fatal transcoder failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    pub file: PathBuf,
    /// The command line that failed, if one was built
    pub command: Option<String>,
    /// Captured diagnostic output, if any
    pub output: Option<String>,
}

/// The single terminal event of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub job_id: Uuid,
    pub state: JobState,
    pub message: String,
    pub failure: Option<FailureReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl JobOutcome {
    pub fn success(&self) -> bool {
        self.state == JobState::Completed
    }
}

/// Notifications published while a job runs
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// Overall percentage, 0-100, never decreasing
    Progress(u8),
    /// Human readable narration
    Status(String),
    /// Terminal event, sent exactly once
    Finished(JobOutcome),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_from_settings_defaults() {
        let kind = JobKind::from_settings("extract", &map(json!({}))).unwrap();
        assert_eq!(kind, JobKind::Extract(ExtractSettings { format: AudioFormat::Aac }));

        let kind = JobKind::from_settings("merge", &map(json!({}))).unwrap();
        match kind {
            JobKind::Merge(s) => assert!(s.preserve_original),
            other => panic!("unexpected kind {:?}", other),
        }

        let kind = JobKind::from_settings("rename", &map(json!({"unrelated": 1}))).unwrap();
        assert_eq!(kind, JobKind::Rename(RenameSettings::default()));
    }

    #[test]
    fn test_parallel_languages_attach_to_companions() {
        let kind = JobKind::from_settings("merge", &map(json!({
            "audio_files": ["/a/ep1.aac", {"path": "/a/ep1.de.aac", "language": "ger"}, "/a/ep1.fr.aac"],
            "languages": ["eng", "spa"],
            "preserve_original": false
        }))).unwrap();

        let JobKind::Merge(s) = kind else { panic!("expected merge") };
        assert!(!s.preserve_original);
        assert_eq!(s.audio_files[0], Companion::with_language("/a/ep1.aac", "eng"));
        // inline language wins over the parallel list
        assert_eq!(s.audio_files[1], Companion::with_language("/a/ep1.de.aac", "ger"));
        assert_eq!(s.audio_files[2], Companion::new("/a/ep1.fr.aac"));
    }

    #[test]
    fn test_embed_mode_labels() {
        let kind = JobKind::from_settings("embed", &map(json!({
            "subtitle_files": ["/s/ep1.srt"],
            "subtitle_type": "Hard Subtitles (Burned-in)",
            "default_subtitle": true
        }))).unwrap();
        let JobKind::Embed(s) = kind else { panic!("expected embed") };
        assert_eq!(s.subtitle_type, SubtitleMode::Hard);
        assert!(s.default_subtitle);
        assert_eq!(s.subtitle_codec, DEFAULT_SUBTITLE_CODEC);
    }

    #[test]
    fn test_bad_settings_rejected() {
        let err = JobKind::from_settings("extract", &map(json!({"format": "wma"}))).unwrap_err();
        assert!(matches!(err, JobError::InvalidSettings { .. }));

        let err = JobKind::from_settings("transmogrify", &map(json!({}))).unwrap_err();
        assert!(matches!(err, JobError::UnknownKind(k) if k == "transmogrify"));
    }

    #[test]
    fn test_tagged_job_kind_round_trip_from_toml() {
        let kind: JobKind = toml::from_str(
            "kind = \"embed\"\nsubtitle_files = [\"/s/a.srt\"]\nsubtitle_type = \"soft\"\n",
        ).unwrap();
        assert_eq!(kind.name(), "embed");
        assert_eq!(kind.companion_pool().map(|p| p.len()), Some(1));
    }

    #[test]
    fn test_validate() {
        let extract = JobKind::Extract(ExtractSettings::default());
        let job = ProcessingJob::new(vec![], Some(PathBuf::from("/out")), extract.clone());
        assert!(matches!(job.validate(), Err(JobError::NoInputFiles)));

        let job = ProcessingJob::new(vec![MediaFile::new("/v/a.mkv")], None, extract);
        assert!(matches!(job.validate(), Err(JobError::MissingOutputDirectory("extract"))));

        let rename = JobKind::Rename(RenameSettings::default());
        let job = ProcessingJob::new(vec![MediaFile::new("/v/a.mkv")], None, rename);
        assert!(job.validate().is_ok());
    }

    #[test]
    fn test_state_transitions() {
        assert!(JobState::Idle.can_transition_to(JobState::Running));
        assert!(!JobState::Idle.can_transition_to(JobState::Failed));
        assert!(!JobState::Idle.can_transition_to(JobState::Cancelled));
        assert!(JobState::Running.can_transition_to(JobState::Cancelled));
        assert!(!JobState::Running.can_transition_to(JobState::Idle));
        for terminal in [JobState::Completed, JobState::Cancelled, JobState::Failed] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(JobState::Running));
        }
    }
}
