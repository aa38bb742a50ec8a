use anyhow::{anyhow, bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use log::{debug, error, info, warn};
use mux_engine::{
    companion::{companion_preview, Companion},
    job::{AudioFormat, EmbedSettings, ExtractSettings, MergeSettings, RenameSettings, SubtitleMode, DEFAULT_SUBTITLE_CODEC},
    languages::LanguageTable,
    media::{MediaFile, TrackKind},
    metadata::{EpisodeTitleLookup, NoLookup, TitleTable},
    rename::{apply_name_edits, plan_renames, NameEdit, PlanStatus},
    scan::{collect_media_paths, AUDIO_EXTENSIONS, RENAMEABLE_EXTENSIONS, SUBTITLE_EXTENSIONS, VIDEO_EXTENSIONS},
    spawn_job, EngineConfig, FfmpegTools, JobEvent, JobKind, JobOutcome, JobState, MediaTools, ProcessingJob,
};
use serde::Deserialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

/// Batch audio extraction, audio merging, subtitle embedding and episode renaming
#[derive(Parser, Debug)]
#[command(name = "muxbatch", author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (JSON or TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract the audio track of each video
    Extract {
        /// Video files or folders
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(short, long, value_enum, default_value_t = FormatArg::Aac)]
        format: FormatArg,
        #[command(flatten)]
        edits: NameEditArgs,
    },
    /// Add audio tracks to each video with a matching name
    Merge {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
        /// Audio file or folder, optionally tagged with a language: PATH[=LANG]
        #[arg(short, long = "audio", value_name = "PATH[=LANG]", required = true)]
        audio: Vec<String>,
        /// Drop the original audio instead of keeping the other original streams
        #[arg(long)]
        replace_audio: bool,
        /// Only print which companions match which video
        #[arg(long)]
        show_matches: bool,
    },
    /// Add subtitles to each video with a matching name
    Embed {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
        /// Subtitle file or folder, optionally tagged with a language: PATH[=LANG]
        #[arg(short, long = "subtitle", value_name = "PATH[=LANG]", required = true)]
        subtitles: Vec<String>,
        #[arg(long, value_enum, default_value_t = ModeArg::Soft)]
        mode: ModeArg,
        /// Mark the first new subtitle track as default
        #[arg(long)]
        default_subtitle: bool,
        /// Codec for soft subtitles
        #[arg(long, default_value = DEFAULT_SUBTITLE_CODEC)]
        codec: String,
        /// Only print which companions match which video
        #[arg(long)]
        show_matches: bool,
    },
    /// Rename episodes from a filename template
    Rename {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(long)]
        show: String,
        /// Filename template, e.g. "{name} - S{season:02d}E{episode:02d} - {title}{ext}"
        #[arg(long)]
        template: Option<String>,
        /// JSON file of episode titles keyed like "S01E02"
        #[arg(long)]
        titles: Option<PathBuf>,
        /// Print the rename plan without touching any file
        #[arg(long)]
        preview: bool,
        #[command(flatten)]
        edits: NameEditArgs,
    },
    /// Show duration and track summary of media files
    Probe {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// List the languages available for tagging
    Languages,
    /// Run a job described in a JSON or TOML file
    Run {
        #[arg(long)]
        job: PathBuf,
        /// JSON file of episode titles for rename jobs
        #[arg(long)]
        titles: Option<PathBuf>,
    },
}

#[derive(ClapArgs, Debug, Default)]
struct NameEditArgs {
    /// Replace text in display names before processing: FIND=REPLACE
    #[arg(long = "replace", value_name = "FIND=REPLACE")]
    replace: Vec<String>,
    /// Text to put in front of every display name
    #[arg(long)]
    prefix: Option<String>,
    /// Text to append to every display name, before the extension
    #[arg(long)]
    suffix: Option<String>,
}

impl NameEditArgs {
    fn to_edits(&self) -> Result<Vec<NameEdit>> {
        let mut edits = Vec::new();
        for spec in &self.replace {
            let (find, replace) = spec
                .split_once('=')
                .ok_or_else(|| anyhow!("--replace expects FIND=REPLACE, got '{}'", spec))?;
            edits.push(NameEdit::FindReplace { find: find.to_string(), replace: replace.to_string() });
        }
        if let Some(ref prefix) = self.prefix {
            edits.push(NameEdit::Prefix(prefix.clone()));
        }
        if let Some(ref suffix) = self.suffix {
            edits.push(NameEdit::Suffix(suffix.clone()));
        }
        Ok(edits)
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Aac,
    Mp3,
    Flac,
    Ogg,
}

impl From<FormatArg> for AudioFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Aac => AudioFormat::Aac,
            FormatArg::Mp3 => AudioFormat::Mp3,
            FormatArg::Flac => AudioFormat::Flac,
            FormatArg::Ogg => AudioFormat::Ogg,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Soft,
    Hard,
}

impl From<ModeArg> for SubtitleMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Soft => SubtitleMode::Soft,
            ModeArg::Hard => SubtitleMode::Hard,
        }
    }
}

/// Job file layout for `run --job`
#[derive(Debug, Deserialize)]
struct JobFile {
    kind: String,
    inputs: Vec<PathBuf>,
    output_directory: Option<PathBuf>,
    #[serde(default)]
    settings: serde_json::Map<String, serde_json::Value>,
}

const EXIT_FAILED: u8 = 1;
const EXIT_CANCELLED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // RUST_LOG wins; otherwise info, or debug with --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_FAILED)
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let cfg = EngineConfig::load_config(args.config.as_deref())
        .context("Failed to load configuration")?;
    debug!("Configuration loaded: ffmpeg={} ffprobe={}", cfg.ffmpeg_bin.display(), cfg.ffprobe_path().display());
    let languages = LanguageTable::with_custom(&cfg.custom_languages);

    match args.command {
        Commands::Extract { inputs, output, format, edits } => {
            let files = apply_name_edits(&media_files(&inputs, VIDEO_EXTENSIONS)?, &edits.to_edits()?);
            let kind = JobKind::Extract(ExtractSettings { format: format.into() });
            execute(ProcessingJob::new(files, Some(output), kind), cfg, Arc::new(NoLookup)).await
        }
        Commands::Merge { inputs, output, audio, replace_audio, show_matches } => {
            let files = media_files(&inputs, VIDEO_EXTENSIONS)?;
            let audio_files = parse_companions(&audio, AUDIO_EXTENSIONS, &languages)?;
            if show_matches {
                print_matches(&files, &audio_files);
                return Ok(ExitCode::SUCCESS);
            }
            let kind = JobKind::Merge(MergeSettings { audio_files, preserve_original: !replace_audio });
            execute(ProcessingJob::new(files, Some(output), kind), cfg, Arc::new(NoLookup)).await
        }
        Commands::Embed { inputs, output, subtitles, mode, default_subtitle, codec, show_matches } => {
            let files = media_files(&inputs, VIDEO_EXTENSIONS)?;
            let subtitle_files = parse_companions(&subtitles, SUBTITLE_EXTENSIONS, &languages)?;
            if show_matches {
                print_matches(&files, &subtitle_files);
                return Ok(ExitCode::SUCCESS);
            }
            let kind = JobKind::Embed(EmbedSettings {
                subtitle_files,
                subtitle_type: mode.into(),
                default_subtitle,
                subtitle_codec: codec,
            });
            execute(ProcessingJob::new(files, Some(output), kind), cfg, Arc::new(NoLookup)).await
        }
        Commands::Rename { inputs, show, template, titles, preview, edits } => {
            let files = apply_name_edits(&media_files(&inputs, RENAMEABLE_EXTENSIONS)?, &edits.to_edits()?);
            let lookup = title_lookup(titles.as_deref())?;
            let settings = RenameSettings {
                show_name: show,
                filename_template: template,
                use_api: titles.is_some(),
                preview_mode: preview,
            };

            let plan = plan_renames(&files, &settings, &cfg.rename_template, lookup.as_ref());
            if preview {
                for entry in &plan.entries {
                    match (&entry.target_name, entry.status) {
                        (Some(name), PlanStatus::TitleNotFound) => println!("{} → {} (no title found)", entry.display_name, name),
                        (Some(name), _) => println!("{} → {}", entry.display_name, name),
                        (None, _) => println!("{} → (no season/episode found)", entry.display_name),
                    }
                }
                println!("{} of {} file(s) would be renamed", plan.valid_count(), plan.entries.len());
            }
            for conflict in plan.conflicts() {
                if let Some(ref target) = conflict.target {
                    warn!("Target already exists and will be skipped: {}", target.display());
                }
            }
            if preview {
                return Ok(ExitCode::SUCCESS);
            }

            let job = ProcessingJob::new(files, None, JobKind::Rename(settings));
            execute(job, cfg, lookup).await
        }
        Commands::Probe { inputs } => {
            probe(&inputs, &cfg).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Languages => {
            for lang in languages.iter() {
                let origin = if lang.builtin { "" } else { " (custom)" };
                println!("{}\t{}{}", lang.code, lang.name, origin);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run { job, titles } => {
            let job = load_job_file(&job)?;
            let lookup = title_lookup(titles.as_deref())?;
            execute(job, cfg, lookup).await
        }
    }
}

/// Expand inputs into media files, failing when nothing usable remains
fn media_files(inputs: &[PathBuf], extensions: &[&str]) -> Result<Vec<MediaFile>> {
    let paths = collect_media_paths(inputs, extensions);
    if paths.is_empty() {
        bail!("No media files found in the given inputs");
    }
    info!("Found {} media file(s)", paths.len());
    Ok(paths.into_iter().map(MediaFile::new).collect())
}

/// Parse `PATH[=LANG]` arguments; a folder contributes every file it holds
/// with the same language
fn parse_companions(specs: &[String], extensions: &[&str], languages: &LanguageTable) -> Result<Vec<Companion>> {
    let mut companions = Vec::new();
    for spec in specs {
        let (path, language) = split_language(spec, languages);
        let paths = collect_media_paths(&[path.clone()], extensions);
        if paths.is_empty() {
            warn!("No usable companion files in {}", path.display());
        }
        companions.extend(paths.into_iter().map(|p| Companion { path: p, language: language.clone() }));
    }
    if companions.is_empty() {
        bail!("No companion files found");
    }
    Ok(companions)
}

/// Split a trailing `=LANG` off a companion argument when it names a language
/// (by name or code) or looks like a three-letter code
fn split_language(spec: &str, languages: &LanguageTable) -> (PathBuf, Option<String>) {
    if let Some((path, lang)) = spec.rsplit_once('=') {
        if let Some(code) = languages.lookup_code(lang) {
            return (PathBuf::from(path), Some(code.to_string()));
        }
        if lang.len() == 3 && lang.chars().all(|c| c.is_ascii_alphabetic()) {
            return (PathBuf::from(path), Some(lang.to_lowercase()));
        }
    }
    (PathBuf::from(spec), None)
}

fn title_lookup(titles: Option<&Path>) -> Result<Arc<dyn EpisodeTitleLookup>> {
    match titles {
        Some(path) => {
            let table = TitleTable::load(path)?;
            info!("Loaded {} episode title(s) from {}", table.len(), path.display());
            Ok(Arc::new(table))
        }
        None => Ok(Arc::new(NoLookup)),
    }
}

fn load_job_file(path: &Path) -> Result<ProcessingJob> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read job file: {}", path.display()))?;
    let file: JobFile = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML job file: {}", path.display()))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON job file: {}", path.display()))?
    };

    let kind = JobKind::from_settings(&file.kind, &file.settings)
        .with_context(|| format!("Invalid job in {}", path.display()))?;
    let extensions = match kind {
        JobKind::Rename(_) => RENAMEABLE_EXTENSIONS,
        _ => VIDEO_EXTENSIONS,
    };
    let files = media_files(&file.inputs, extensions)?;
    Ok(ProcessingJob::new(files, file.output_directory, kind))
}

fn print_matches(files: &[MediaFile], companions: &[Companion]) {
    for preview in companion_preview(files, companions) {
        if preview.companions.is_empty() {
            println!("{}: no match", preview.primary);
        } else {
            println!("{}: {}", preview.primary, preview.companions.join(", "));
        }
    }
}

async fn probe(inputs: &[PathBuf], cfg: &EngineConfig) -> Result<()> {
    let tools = FfmpegTools::new(cfg.clone());
    for mut file in media_files(inputs, VIDEO_EXTENSIONS)? {
        match tools.probe(&file.path).await {
            Ok(data) => {
                file.apply_probe(&data);
                println!(
                    "{}\t{:.1}s\taudio: {}\tsubtitles: {}",
                    file.filename,
                    file.duration,
                    file.track_summary(TrackKind::Audio),
                    file.track_summary(TrackKind::Subtitle)
                );
            }
            Err(e) => {
                warn!("Could not probe {}: {:#}", file.path.display(), e);
                println!("{}\tUnknown\taudio: Unknown\tsubtitles: Unknown", file.filename);
            }
        }
    }
    Ok(())
}

/// Run a job to its terminal outcome, cancelling it on Ctrl-C
async fn execute(job: ProcessingJob, cfg: EngineConfig, lookup: Arc<dyn EpisodeTitleLookup>) -> Result<ExitCode> {
    let tools = Arc::new(FfmpegTools::new(cfg.clone()));
    let mut handle = spawn_job(job, tools, lookup, cfg);
    info!("Job {} started", handle.id);

    let token = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling job");
            token.cancel();
        }
    });

    let mut progress_shown = false;
    while let Some(event) = handle.next_event().await {
        match event {
            JobEvent::Progress(p) => {
                eprint!("\rProgress: {:>3}%", p);
                let _ = std::io::stderr().flush();
                progress_shown = true;
            }
            JobEvent::Status(text) => {
                if progress_shown {
                    eprintln!();
                    progress_shown = false;
                }
                println!("{}", text);
            }
            JobEvent::Finished(outcome) => {
                if progress_shown {
                    eprintln!();
                }
                return Ok(report(&outcome));
            }
        }
    }

    Err(anyhow!("Job ended without reporting an outcome"))
}

fn report(outcome: &JobOutcome) -> ExitCode {
    let elapsed = outcome.finished_at - outcome.started_at;
    match outcome.state {
        JobState::Completed => {
            println!("✅ {} ({}s)", outcome.message, elapsed.num_seconds());
            ExitCode::SUCCESS
        }
        JobState::Cancelled => {
            println!("⏹️  {}", outcome.message);
            ExitCode::from(EXIT_CANCELLED)
        }
        _ => {
            eprintln!("❌ {}", outcome.message);
            if let Some(ref failure) = outcome.failure {
                if let Some(ref command) = failure.command {
                    eprintln!("Command: {}", command);
                }
                if let Some(ref output) = failure.output {
                    eprintln!("Output:\n{}", output);
                }
            }
            ExitCode::from(EXIT_FAILED)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_language() {
        let table = LanguageTable::default();
        assert_eq!(split_language("/a/ep1.aac=eng", &table), (PathBuf::from("/a/ep1.aac"), Some("eng".to_string())));
        assert_eq!(split_language("/a/ep1.aac=Japanese", &table), (PathBuf::from("/a/ep1.aac"), Some("jpn".to_string())));
        assert_eq!(split_language("/a/ep1.aac=TLH", &table), (PathBuf::from("/a/ep1.aac"), Some("tlh".to_string())));
        assert_eq!(split_language("/a/x=y/ep1.aac", &table), (PathBuf::from("/a/x=y/ep1.aac"), None));
        assert_eq!(split_language("/a/ep1.aac", &table), (PathBuf::from("/a/ep1.aac"), None));
    }

    #[test]
    fn test_name_edit_args() {
        let args = NameEditArgs {
            replace: vec!["_=.".to_string()],
            prefix: Some("New ".to_string()),
            suffix: None,
        };
        let edits = args.to_edits().unwrap();
        assert_eq!(edits, vec![
            NameEdit::FindReplace { find: "_".to_string(), replace: ".".to_string() },
            NameEdit::Prefix("New ".to_string()),
        ]);

        let bad = NameEditArgs { replace: vec!["nothing".to_string()], ..Default::default() };
        assert!(bad.to_edits().is_err());
    }

    #[test]
    fn test_load_toml_job_file() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("ep1.mkv");
        std::fs::write(&video, b"").unwrap();
        let job_path = dir.path().join("job.toml");
        std::fs::write(&job_path, format!(
            "kind = \"extract\"\ninputs = [{:?}]\noutput_directory = \"/out\"\n\n[settings]\nformat = \"flac\"\n",
            dir.path().display().to_string()
        )).unwrap();

        let job = load_job_file(&job_path).unwrap();
        assert_eq!(job.input_files.len(), 1);
        assert_eq!(job.input_files[0].path, video);
        assert_eq!(job.kind, JobKind::Extract(ExtractSettings { format: AudioFormat::Flac }));
    }

    #[test]
    fn test_cli_parses() {
        let args = Args::try_parse_from([
            "muxbatch", "merge", "/v", "-o", "/out", "-a", "/a/ep1.aac=eng", "--replace-audio",
        ]).unwrap();
        match args.command {
            Commands::Merge { audio, replace_audio, .. } => {
                assert_eq!(audio, vec!["/a/ep1.aac=eng".to_string()]);
                assert!(replace_audio);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
