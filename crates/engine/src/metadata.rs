//! Episode title sources for rename jobs.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;
use anyhow::{Context, Result};
use log::warn;
use regex::Regex;

static KEY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^s(\d+)e(\d+)$").unwrap());

/// Looks up an episode's title by show, season and episode.
///
/// `Ok(None)` means the source has no title for that episode.
pub trait EpisodeTitleLookup: Send + Sync {
    fn episode_title(&self, show: &str, season: u32, episode: u32) -> Result<Option<String>>;
}

/// Lookup that never finds anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLookup;

impl EpisodeTitleLookup for NoLookup {
    fn episode_title(&self, _show: &str, _season: u32, _episode: u32) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Titles for a single show keyed by `S01E02`-style codes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TitleTable {
    titles: HashMap<String, String>,
}

fn episode_key(season: u32, episode: u32) -> String {
    format!("S{:02}E{:02}", season, episode)
}

fn parse_key(key: &str) -> Option<(u32, u32)> {
    let caps = KEY_RE.captures(key.trim())?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}

impl TitleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON object such as `{"S01E01": "Pilot"}`
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read title table: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse title table: {}", path.display()))
    }

    /// Keys are `SxxEyy` in any case and padding; other keys are skipped
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: HashMap<String, String> = serde_json::from_str(json)?;
        let mut table = Self::new();
        for (key, title) in raw {
            match parse_key(&key) {
                Some((season, episode)) => table.insert(season, episode, title),
                None => warn!("Ignoring title table key '{}'", key),
            }
        }
        Ok(table)
    }

    pub fn insert(&mut self, season: u32, episode: u32, title: impl Into<String>) {
        self.titles.insert(episode_key(season, episode), title.into());
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}

impl EpisodeTitleLookup for TitleTable {
    fn episode_title(&self, _show: &str, season: u32, episode: u32) -> Result<Option<String>> {
        Ok(self.titles.get(&episode_key(season, episode)).cloned())
    }
}
