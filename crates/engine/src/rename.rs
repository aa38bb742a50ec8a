//! Name edits and rename planning.
//!
//! Edits produce new [`MediaFile`] values instead of mutating the batch, and
//! a [`RenamePlan`] is the value handed from preview to execution.

use std::path::{Path, PathBuf};
use log::warn;
use serde::{Deserialize, Serialize};
use crate::episode::{parse_season_episode, EpisodeNumber};
use crate::job::RenameSettings;
use crate::media::MediaFile;
use crate::metadata::EpisodeTitleLookup;
use crate::template::{render_filename, TemplateValues};

/// A display-name edit applied before a batch runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameEdit {
    FindReplace { find: String, replace: String },
    /// Prepended to the stem
    Prefix(String),
    /// Appended to the stem, before the extension
    Suffix(String),
}

impl NameEdit {
    fn apply(&self, filename: &str) -> String {
        match self {
            NameEdit::FindReplace { find, .. } if find.is_empty() => filename.to_string(),
            NameEdit::FindReplace { find, replace } => filename.replace(find.as_str(), replace),
            NameEdit::Prefix(text) => {
                let (stem, ext) = split_extension(filename);
                format!("{}{}{}", text, stem, ext)
            }
            NameEdit::Suffix(text) => {
                let (stem, ext) = split_extension(filename);
                format!("{}{}{}", stem, text, ext)
            }
        }
    }
}

/// Split "name.ext" into ("name", ".ext"); dotfiles and names without a dot
/// have no extension
fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(0) | None => (filename, ""),
        Some(pos) => filename.split_at(pos),
    }
}

/// Apply edits in order to each file's display name. Paths are untouched.
pub fn apply_name_edits(files: &[MediaFile], edits: &[NameEdit]) -> Vec<MediaFile> {
    files
        .iter()
        .map(|file| {
            let filename = edits.iter().fold(file.filename.clone(), |name, edit| edit.apply(&name));
            file.clone().with_filename(filename)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlanStatus {
    Ready,
    /// No season/episode in the display name; the file keeps its name
    Unparsed,
    /// Renameable, but the title lookup missed or failed so `{title}` is empty
    TitleNotFound,
}

/// What will happen to one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameEntry {
    pub source: PathBuf,
    pub display_name: String,
    pub episode: Option<EpisodeNumber>,
    pub target_name: Option<String>,
    pub target: Option<PathBuf>,
    pub status: PlanStatus,
}

impl RenameEntry {
    /// Has a target that differs from the source
    pub fn is_renameable(&self) -> bool {
        self.target.as_deref().is_some_and(|t| t != self.source.as_path())
    }

    /// Target exists on disk and is a different file than the source
    pub fn has_conflict(&self) -> bool {
        self.is_renameable() && self.target.as_deref().is_some_and(Path::exists)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenamePlan {
    pub entries: Vec<RenameEntry>,
}

impl RenamePlan {
    /// Entries that would actually change a name
    pub fn valid_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_renameable()).count()
    }

    /// Entries whose target already exists, for the caller to confirm
    pub fn conflicts(&self) -> Vec<&RenameEntry> {
        self.entries.iter().filter(|e| e.has_conflict()).collect()
    }
}

/// Template for a rename job: the job's own, else the configured default
pub fn effective_template<'a>(settings: &'a RenameSettings, default_template: &'a str) -> &'a str {
    settings.filename_template.as_deref().unwrap_or(default_template)
}

/// Plan the rename of one file.
///
/// Season and episode come from the display filename, the extension from the
/// underlying path. The lookup is only consulted when `use_api` is set.
pub fn plan_rename(
    file: &MediaFile,
    settings: &RenameSettings,
    default_template: &str,
    lookup: &dyn EpisodeTitleLookup,
) -> RenameEntry {
    let mut entry = RenameEntry {
        source: file.path.clone(),
        display_name: file.filename.clone(),
        episode: None,
        target_name: None,
        target: None,
        status: PlanStatus::Unparsed,
    };

    let Some(number) = parse_season_episode(&file.filename) else {
        return entry;
    };
    entry.episode = Some(number);
    entry.status = PlanStatus::Ready;

    let mut title = String::new();
    if settings.use_api {
        match lookup.episode_title(&settings.show_name, number.season, number.episode) {
            Ok(Some(found)) => title = found,
            Ok(None) => entry.status = PlanStatus::TitleNotFound,
            Err(e) => {
                warn!(
                    "Title lookup failed for {} S{:02}E{:02}: {:#}",
                    settings.show_name, number.season, number.episode, e
                );
                entry.status = PlanStatus::TitleNotFound;
            }
        }
    }

    let values = TemplateValues::new(&settings.show_name, number.season, number.episode, &title, &file.extension());
    let name = render_filename(effective_template(settings, default_template), &values);
    let parent = file.path.parent().unwrap_or_else(|| Path::new(""));
    entry.target = Some(parent.join(&name));
    entry.target_name = Some(name);
    entry
}

/// Plan every file of a rename job, in order
pub fn plan_renames(
    files: &[MediaFile],
    settings: &RenameSettings,
    default_template: &str,
    lookup: &dyn EpisodeTitleLookup,
) -> RenamePlan {
    RenamePlan {
        entries: files
            .iter()
            .map(|f| plan_rename(f, settings, default_template, lookup))
            .collect(),
    }
}
