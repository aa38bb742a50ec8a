//! Season/episode extraction from filenames.
//!
//! Patterns are tried in a fixed priority order and the first one that
//! matches anywhere in the name decides the result, even if a later pattern
//! would also match.

use std::sync::LazyLock;
use regex::Regex;
use serde::Serialize;

static SXXEYY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)s(\d+)e(\d+)").unwrap());
static NXM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(\d+)x(\d+)").unwrap());
static VERBOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)season\s*(\d+).*episode\s*(\d+)").unwrap());
static DASHED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*-\s*(\d+)").unwrap());

/// Patterns in precedence order
static PATTERNS: [&LazyLock<Regex>; 4] = [&SXXEYY_RE, &NXM_RE, &VERBOSE_RE, &DASHED_RE];

/// Season and episode numbers parsed from a filename
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EpisodeNumber {
    pub season: u32,
    pub episode: u32,
}

/// Extract (season, episode) from a filename.
///
/// Returns `None` when no pattern matches. A match whose digits overflow
/// `u32` also yields `None`; later patterns are not consulted in that case.
pub fn parse_season_episode(filename: &str) -> Option<EpisodeNumber> {
    for pattern in PATTERNS {
        if let Some(caps) = pattern.captures(filename) {
            let season = caps.get(1)?.as_str().parse().ok()?;
            let episode = caps.get(2)?.as_str().parse().ok()?;
            return Some(EpisodeNumber { season, episode });
        }
    }
    None
}
