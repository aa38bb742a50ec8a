use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use log::{debug, info, warn};

/// Video containers accepted as primary files
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v"];

/// Audio files accepted as merge companions
pub const AUDIO_EXTENSIONS: &[&str] = &["aac", "mp3", "flac", "ogg", "wav", "m4a", "ac3", "eac3", "opus"];

/// Subtitle files accepted as embed companions
pub const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "ass", "ssa", "vtt", "sub"];

/// Files a rename job will touch
pub const RENAMEABLE_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "srt", "ass", "ssa", "vtt"];

fn has_allowed_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
        .is_some_and(|ext| allowed.contains(&ext.as_str()))
}

/// Collect files with an allowed extension from a mix of files and folders.
///
/// Folders are walked recursively, entries that do not exist are skipped,
/// and the result is sorted with duplicates removed.
pub fn collect_media_paths(inputs: &[PathBuf], allowed_extensions: &[&str]) -> Vec<PathBuf> {
    let mut found = BTreeSet::new();

    for input in inputs {
        if !input.exists() {
            warn!("Input does not exist: {}", input.display());
            continue;
        }

        if input.is_file() {
            if has_allowed_extension(input, allowed_extensions) {
                found.insert(input.clone());
            } else {
                debug!("Ignoring {}: extension not accepted", input.display());
            }
            continue;
        }

        info!("Scanning directory: {}", input.display());
        let mut entry_count = 0;
        for entry in WalkDir::new(input).follow_links(false) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Error reading directory entry: {}", e);
                    continue;
                }
            };
            entry_count += 1;

            let path = entry.path();
            if path.is_file() && has_allowed_extension(path, allowed_extensions) {
                debug!("Found media file: {}", path.display());
                found.insert(path.to_path_buf());
            }
        }
        debug!("Finished scanning {}: {} entries", input.display(), entry_count);
    }

    found.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_collects_files_and_folders() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("b.mkv"));
        touch(&root.join("season1/a.MP4"));
        touch(&root.join("season1/deep/c.webm"));
        touch(&root.join("season1/notes.txt"));
        touch(&root.join("loose.srt"));

        let inputs = vec![
            root.join("season1"),
            root.join("b.mkv"),
            root.join("b.mkv"),
            root.join("loose.srt"),
            root.join("missing.mkv"),
        ];
        let found = collect_media_paths(&inputs, VIDEO_EXTENSIONS);
        assert_eq!(found, vec![
            root.join("b.mkv"),
            root.join("season1/a.MP4"),
            root.join("season1/deep/c.webm"),
        ]);

        let subs = collect_media_paths(&[root.to_path_buf()], SUBTITLE_EXTENSIONS);
        assert_eq!(subs, vec![root.join("loose.srt")]);
    }

    #[test]
    fn test_extension_sets() {
        assert!(has_allowed_extension(Path::new("x.FLAC"), AUDIO_EXTENSIONS));
        assert!(has_allowed_extension(Path::new("x.ass"), RENAMEABLE_EXTENSIONS));
        assert!(!has_allowed_extension(Path::new("x"), VIDEO_EXTENSIONS));
        assert!(!has_allowed_extension(Path::new("x.mp3"), VIDEO_EXTENSIONS));
    }
}
