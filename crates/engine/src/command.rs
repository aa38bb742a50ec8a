//! Transcoder argument vectors, one builder per job kind.
//!
//! Builders are pure: they never touch the filesystem or spawn anything, so
//! every command can be checked against a literal expected vector.

use std::path::Path;
use crate::companion::Companion;
use crate::job::{EmbedSettings, ExtractSettings, MergeSettings, SubtitleMode};
use crate::media::MediaFile;

/// Inputs shared by every builder
#[derive(Debug, Clone, Copy)]
pub struct CommandContext<'a> {
    /// Transcoder executable, emitted as the first argument
    pub program: &'a str,
    pub output_dir: &'a Path,
}

/// Turns one primary file (and its matched companions) into a command line
pub trait BuildCommand: Send + Sync {
    /// Full argument vector, program first. An empty vector means there is
    /// nothing to run for this file.
    fn build_command(&self, ctx: &CommandContext<'_>, file: &MediaFile, companions: &[&Companion]) -> Vec<String>;
}

fn output_path(ctx: &CommandContext<'_>, file_name: String) -> String {
    ctx.output_dir.join(file_name).to_string_lossy().to_string()
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Escape a path for use inside a `subtitles=` filter argument
pub fn escape_filter_path(path: &Path) -> String {
    path_arg(path).replace('\\', "/").replace(':', "\\:")
}

impl BuildCommand for ExtractSettings {
    /// Audio-only output named after the display filename's stem
    fn build_command(&self, ctx: &CommandContext<'_>, file: &MediaFile, _companions: &[&Companion]) -> Vec<String> {
        let mut args = Vec::new();
        args.push(ctx.program.to_string());

        args.push("-i".to_string());
        args.push(path_arg(&file.path));

        // Drop video
        args.push("-vn".to_string());

        args.push("-acodec".to_string());
        args.push(self.format.encoder().to_string());

        args.push("-y".to_string());
        args.push(output_path(ctx, format!("{}.{}", file.display_stem(), self.format.extension())));

        args
    }
}

impl BuildCommand for MergeSettings {
    fn build_command(&self, ctx: &CommandContext<'_>, file: &MediaFile, companions: &[&Companion]) -> Vec<String> {
        let mut args = Vec::new();
        args.push(ctx.program.to_string());

        // Input 0 is the video, inputs 1..=n the new audio tracks
        args.push("-i".to_string());
        args.push(path_arg(&file.path));
        for audio in companions {
            args.push("-i".to_string());
            args.push(path_arg(&audio.path));
        }

        if self.preserve_original {
            // Everything from the video except its own audio
            args.push("-map".to_string());
            args.push("0".to_string());
            args.push("-map".to_string());
            args.push("-0:a".to_string());
        } else {
            args.push("-map".to_string());
            args.push("0:v".to_string());
            args.push("-map".to_string());
            args.push("0:s?".to_string());
        }

        for i in 0..companions.len() {
            args.push("-map".to_string());
            args.push(format!("{}:a", i + 1));
        }

        for (i, audio) in companions.iter().enumerate() {
            if let Some(ref language) = audio.language {
                args.push(format!("-metadata:s:a:{}", i));
                args.push(format!("language={}", language));
            }
        }

        args.push("-c".to_string());
        args.push("copy".to_string());

        args.push("-y".to_string());
        args.push(output_path(ctx, format!("{}_merged.mkv", file.stem())));

        args
    }
}

impl BuildCommand for EmbedSettings {
    fn build_command(&self, ctx: &CommandContext<'_>, file: &MediaFile, companions: &[&Companion]) -> Vec<String> {
        let output = output_path(ctx, format!("{}_subtitled.mkv", file.stem()));

        match self.subtitle_type {
            SubtitleMode::Hard => {
                // Only the first subtitle can be burned in
                let Some(first) = companions.first() else {
                    return Vec::new();
                };
                vec![
                    ctx.program.to_string(),
                    "-i".to_string(),
                    path_arg(&file.path),
                    "-vf".to_string(),
                    format!("subtitles='{}'", escape_filter_path(&first.path)),
                    "-y".to_string(),
                    output,
                ]
            }
            SubtitleMode::Soft => {
                let mut args = Vec::new();
                args.push(ctx.program.to_string());

                args.push("-i".to_string());
                args.push(path_arg(&file.path));
                for sub in companions {
                    args.push("-i".to_string());
                    args.push(path_arg(&sub.path));
                }

                // Whole original input plus each subtitle input
                args.push("-map".to_string());
                args.push("0".to_string());
                for i in 0..companions.len() {
                    args.push("-map".to_string());
                    args.push((i + 1).to_string());
                }

                args.push("-c".to_string());
                args.push("copy".to_string());
                args.push("-c:s".to_string());
                args.push(self.subtitle_codec.clone());

                let mut tagged = 0;
                for (i, sub) in companions.iter().enumerate() {
                    if let Some(ref language) = sub.language {
                        args.push(format!("-metadata:s:s:{}", i));
                        args.push(format!("language={}", language));
                        tagged += 1;
                    }
                }

                if self.default_subtitle && tagged > 0 {
                    args.push("-disposition:s:0".to_string());
                    args.push("default".to_string());
                }

                args.push("-y".to_string());
                args.push(output);

                args
            }
        }
    }
}
