use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::media::{file_stem, MediaFile};

/// An audio or subtitle file that may belong to a primary video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Companion {
    pub path: PathBuf,
    /// ISO 639-2 code assigned by the caller, if any
    #[serde(default)]
    pub language: Option<String>,
}

impl Companion {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), language: None }
    }

    pub fn with_language(path: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self { path: path.into(), language: Some(language.into()) }
    }

    pub fn stem(&self) -> String {
        file_stem(&self.path)
    }
}

/// Symmetric, case-insensitive containment check between two stems.
///
/// There is no minimum length: a short stem contained in a longer one is a
/// match, even when the overlap is a coincidence.
pub fn stems_match(a: &str, b: &str) -> bool {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    a.contains(&b) || b.contains(&a)
}

/// Every candidate whose stem matches the primary stem, in candidate order.
///
/// No ranking or deduplication is applied; callers that need a single
/// companion must choose among the results themselves.
pub fn match_companions<'a>(primary_stem: &str, candidates: &'a [Companion]) -> Vec<&'a Companion> {
    candidates
        .iter()
        .filter(|c| stems_match(primary_stem, &c.stem()))
        .collect()
}

/// Matched companions for one primary file, as shown before a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchPreview {
    pub primary: String,
    pub companions: Vec<String>,
}

/// Compute the matching preview for a set of primary files.
///
/// Matching uses the stem of each primary's underlying path.
pub fn companion_preview(primaries: &[MediaFile], candidates: &[Companion]) -> Vec<MatchPreview> {
    primaries
        .iter()
        .map(|primary| MatchPreview {
            primary: primary.filename.clone(),
            companions: match_companions(&primary.stem(), candidates)
                .into_iter()
                .map(|c| display_name(&c.path))
                .collect(),
        })
        .collect()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
