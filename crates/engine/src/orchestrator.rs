//! Runs one [`ProcessingJob`] on a worker task.
//!
//! The caller gets a [`JobHandle`] back immediately and observes the job
//! through its event stream: progress percentages, status lines, and exactly
//! one `Finished` event.

use std::path::Path;
use std::sync::Arc;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use crate::command::CommandContext;
use crate::companion::match_companions;
use crate::config::EngineConfig;
use crate::job::{FailureReport, JobEvent, JobKind, JobOutcome, JobState, ProcessingJob, RenameSettings};
use crate::metadata::EpisodeTitleLookup;
use crate::progress::ProgressTracker;
use crate::rename::{effective_template, plan_rename, PlanStatus};
use crate::runner::RunStatus;
use crate::tools::MediaTools;

/// Caller side of a running job
pub struct JobHandle {
    pub id: Uuid,
    events: mpsc::UnboundedReceiver<JobEvent>,
    cancel: CancellationToken,
    task: JoinHandle<JobOutcome>,
}

impl JobHandle {
    /// Request cooperative cancellation
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A token that cancels this job, e.g. for a signal handler
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Next event, or `None` once the job has finished and all events were read
    pub async fn next_event(&mut self) -> Option<JobEvent> {
        self.events.recv().await
    }

    /// Wait for the terminal outcome, discarding unread events
    pub async fn wait(self) -> Result<JobOutcome> {
        drop(self.events);
        self.task.await.map_err(|e| anyhow!("Job task failed: {}", e))
    }
}

/// Start `job` on a new tokio task
pub fn spawn_job<T: MediaTools>(
    job: ProcessingJob,
    tools: Arc<T>,
    lookup: Arc<dyn EpisodeTitleLookup>,
    config: EngineConfig,
) -> JobHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let id = job.id;

    let worker = Worker {
        progress: ProgressTracker::new(job.input_files.len()),
        job,
        tools,
        lookup,
        config,
        cancel: cancel.clone(),
        events: tx,
        state: JobState::Idle,
        started_at: Utc::now(),
    };
    let task = tokio::spawn(worker.run());

    JobHandle { id, events: rx, cancel, task }
}

/// How the file loop ended
enum Step {
    Completed(String),
    Cancelled,
    Failed { message: String, report: Option<FailureReport> },
}

struct Worker<T> {
    job: ProcessingJob,
    tools: Arc<T>,
    lookup: Arc<dyn EpisodeTitleLookup>,
    config: EngineConfig,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<JobEvent>,
    progress: ProgressTracker,
    state: JobState,
    started_at: DateTime<Utc>,
}

impl<T: MediaTools> Worker<T> {
    async fn run(mut self) -> JobOutcome {
        let id = self.job.id;
        info!(
            "Job {}: starting {} of {} file(s)",
            id,
            self.job.kind.name(),
            self.job.input_files.len()
        );

        self.transition(JobState::Running);
        let step = match self.job.validate() {
            Err(e) => Step::Failed { message: e.to_string(), report: None },
            Ok(()) => match self.job.kind.clone() {
                JobKind::Rename(settings) => self.run_rename(&settings).await,
                _ => self.run_transcode().await,
            },
        };

        // Cancellation wins over whatever the loop reported
        let (state, message, failure) = match step {
            _ if self.cancel.is_cancelled() => (JobState::Cancelled, "Job cancelled".to_string(), None),
            Step::Cancelled => (JobState::Cancelled, "Job cancelled".to_string(), None),
            Step::Completed(message) => {
                if let Some(p) = self.progress.finish() {
                    self.send(JobEvent::Progress(p));
                }
                (JobState::Completed, message, None)
            }
            Step::Failed { message, report } => (JobState::Failed, message, report),
        };
        self.transition(state);

        match state {
            JobState::Completed => info!("Job {}: completed: {}", id, message),
            JobState::Cancelled => info!("Job {}: cancelled", id),
            _ => error!("Job {}: failed: {}", id, message),
        }

        let outcome = JobOutcome {
            job_id: id,
            state,
            message,
            failure,
            started_at: self.started_at,
            finished_at: Utc::now(),
        };
        self.send(JobEvent::Finished(outcome.clone()));
        outcome
    }

    fn transition(&mut self, next: JobState) {
        if !self.state.can_transition_to(next) {
            warn!("Job {}: unexpected transition {:?} -> {:?}", self.job.id, self.state, next);
        }
        debug!("Job {}: {:?} -> {:?}", self.job.id, self.state, next);
        self.state = next;
    }

    fn send(&self, event: JobEvent) {
        // The caller may have stopped listening; the job still runs to the end
        let _ = self.events.send(event);
    }

    fn status(&self, text: String) {
        self.send(JobEvent::Status(text));
    }

    fn publish_progress(&self, percent: Option<u8>) {
        if let Some(p) = percent {
            self.send(JobEvent::Progress(p));
        }
    }

    async fn run_transcode(&mut self) -> Step {
        let kind = self.job.kind.clone();
        let Some(builder) = kind.command_builder() else {
            return Step::Failed { message: format!("{} jobs do not run the transcoder", kind.name()), report: None };
        };
        let Some(output_dir) = self.job.output_directory.clone() else {
            return Step::Failed { message: format!("job kind '{}' requires an output directory", kind.name()), report: None };
        };
        let program = self.config.ffmpeg_program();
        let ctx = CommandContext { program: &program, output_dir: &output_dir };
        let files = self.job.input_files.clone();
        let total = files.len();

        for (i, file) in files.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Step::Cancelled;
            }

            self.status(kind.step_status(i + 1, total, &file.filename));

            let companions = match kind.companion_pool() {
                Some(pool) => {
                    let matched = match_companions(&file.stem(), pool);
                    if matched.is_empty() {
                        warn!("Job {}: no companions for {}, skipping", self.job.id, file.path.display());
                        self.status(kind.no_match_status(&file.filename));
                        self.progress.start_file(i, 0.0);
                        let p = self.progress.complete_file();
                        self.publish_progress(p);
                        continue;
                    }
                    matched
                }
                None => Vec::new(),
            };

            let duration = if file.has_duration() {
                file.duration
            } else {
                self.probe_duration(&file.path).await
            };
            if duration <= 0.0 {
                self.status(format!(
                    "Could not get duration for {}. Progress will not be shown.",
                    file.filename
                ));
            }
            let p = self.progress.start_file(i, duration);
            self.publish_progress(p);

            let args = builder.build_command(&ctx, file, &companions);
            if args.is_empty() {
                self.status(kind.no_match_status(&file.filename));
                let p = self.progress.complete_file();
                self.publish_progress(p);
                continue;
            }
            let command_line = args.join(" ");

            if self.cancel.is_cancelled() {
                return Step::Cancelled;
            }
            let result = {
                let progress = &mut self.progress;
                let events = &self.events;
                let mut on_time = |elapsed: f64| {
                    if let Some(p) = progress.update(elapsed) {
                        let _ = events.send(JobEvent::Progress(p));
                    }
                };
                self.tools.transcode(&args, &self.cancel, &mut on_time).await
            };

            let failure = match result {
                Ok(outcome) => match outcome.status {
                    RunStatus::Succeeded => {
                        let p = self.progress.complete_file();
                        self.publish_progress(p);
                        continue;
                    }
                    RunStatus::Cancelled => return Step::Cancelled,
                    RunStatus::Failed => {
                        let output = outcome.diagnostics();
                        error!(
                            "Job {}: transcoder failed for {} (exit code {})\nCommand: {}\n{}",
                            self.job.id,
                            file.path.display(),
                            outcome.exit_code.unwrap_or(-1),
                            command_line,
                            output
                        );
                        (kind.failure_message(&file.filename), Some(output).filter(|o| !o.is_empty()))
                    }
                },
                Err(e) => {
                    error!("Job {}: could not run transcoder for {}: {:#}", self.job.id, file.path.display(), e);
                    (format!("{}: {:#}", kind.failure_message(&file.filename), e), Some(format!("{:#}", e)))
                }
            };

            if self.cancel.is_cancelled() {
                return Step::Cancelled;
            }
            let (message, output) = failure;
            return Step::Failed {
                message,
                report: Some(FailureReport {
                    file: file.path.clone(),
                    command: Some(command_line),
                    output,
                }),
            };
        }

        Step::Completed(kind.completion_message().to_string())
    }

    /// Probed duration in seconds, 0.0 when probing fails
    async fn probe_duration(&self, path: &Path) -> f64 {
        match self.tools.probe(path).await {
            Ok(data) => data.duration_secs().unwrap_or(0.0),
            Err(e) => {
                warn!("Job {}: probe failed for {}: {:#}", self.job.id, path.display(), e);
                0.0
            }
        }
    }

    async fn run_rename(&mut self, settings: &RenameSettings) -> Step {
        let kind = self.job.kind.clone();
        let template = effective_template(settings, &self.config.rename_template).to_string();
        let files = self.job.input_files.clone();
        let mut renamed = 0usize;

        for (i, file) in files.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Step::Cancelled;
            }

            self.status(kind.step_status(i + 1, files.len(), &file.filename));

            // Lookups may block on I/O; plan off the async workers
            let planned = {
                let file = file.clone();
                let settings = settings.clone();
                let template = template.clone();
                let lookup = self.lookup.clone();
                tokio::task::spawn_blocking(move || plan_rename(&file, &settings, &template, lookup.as_ref())).await
            };

            match planned {
                Err(e) => {
                    warn!("Job {}: planning {} failed: {}", self.job.id, file.path.display(), e);
                    self.status(format!("Failed to rename {}: {}", file.filename, e));
                }
                Ok(entry) => {
                    if entry.status == PlanStatus::TitleNotFound {
                        self.status(format!("No episode title found for {}", file.filename));
                    }
                    match (entry.target.as_deref(), entry.target_name.as_deref()) {
                        (Some(target), Some(name)) => {
                            if settings.preview_mode {
                                if entry.is_renameable() && !entry.has_conflict() {
                                    renamed += 1;
                                }
                                self.status(format!("Preview: {} → {}", file.filename, name));
                            } else if !entry.is_renameable() {
                                self.status(format!("{} already has the target name", file.filename));
                            } else if tokio::fs::try_exists(target).await.unwrap_or(false) {
                                warn!("Job {}: not overwriting {}", self.job.id, target.display());
                                self.status(format!("Skipping {}: {} already exists", file.filename, name));
                            } else {
                                match tokio::fs::rename(&file.path, target).await {
                                    Ok(()) => {
                                        renamed += 1;
                                        info!("Job {}: renamed {} -> {}", self.job.id, file.path.display(), target.display());
                                        self.status(format!("Renamed: {} → {}", file.filename, name));
                                    }
                                    Err(e) => {
                                        warn!("Job {}: rename of {} failed: {}", self.job.id, file.path.display(), e);
                                        self.status(format!("Failed to rename {}: {}", file.filename, e));
                                    }
                                }
                            }
                        }
                        _ => {
                            warn!("Job {}: no season/episode in {}", self.job.id, file.filename);
                            self.status(format!("Could not find season/episode in {}", file.filename));
                        }
                    }
                }
            }

            self.progress.start_file(i, 0.0);
            let p = self.progress.complete_file();
            self.publish_progress(p);
        }

        let summary = if settings.preview_mode {
            format!("{} Preview completed ({} file(s) would be renamed)", kind.completion_message(), renamed)
        } else {
            format!("{} Renamed {} files", kind.completion_message(), renamed)
        };
        Step::Completed(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use crate::companion::Companion;
    use crate::ffprobe::FFProbeData;
    use crate::job::{AudioFormat, ExtractSettings, MergeSettings};
    use crate::media::MediaFile;
    use crate::metadata::{NoLookup, TitleTable};
    use crate::runner::RunOutcome;

    /// In-memory tools: records every command and plays back scripted results
    #[derive(Default)]
    struct FakeTools {
        commands: Mutex<Vec<Vec<String>>>,
        durations: HashMap<PathBuf, f64>,
        /// 1-based call number that exits non-zero
        fail_on_call: Option<usize>,
        /// 1-based call number whose transcoder cannot be started
        error_on_call: Option<usize>,
        /// Cancel the job just before a scripted failure is returned
        cancel_before_failing: bool,
        /// Cancel the job right after this call succeeds
        cancel_after_call: Option<usize>,
        /// Block until cancelled on every call
        hang: bool,
    }

    impl FakeTools {
        fn commands(&self) -> Vec<Vec<String>> {
            self.commands.lock().unwrap().clone()
        }
    }

    impl MediaTools for FakeTools {
        async fn probe(&self, path: &Path) -> Result<FFProbeData> {
            match self.durations.get(path) {
                Some(d) => FFProbeData::from_json(&format!(r#"{{"format": {{"duration": "{}"}}}}"#, d)),
                None => Err(anyhow!("no such file")),
            }
        }

        async fn transcode(
            &self,
            args: &[String],
            cancel: &CancellationToken,
            on_time: &mut (dyn FnMut(f64) + Send),
        ) -> Result<RunOutcome> {
            let call = {
                let mut commands = self.commands.lock().unwrap();
                commands.push(args.to_vec());
                commands.len()
            };

            if self.hang {
                cancel.cancelled().await;
                return Ok(RunOutcome { status: RunStatus::Cancelled, exit_code: None, diagnostic_tail: vec![] });
            }

            on_time(5.0);
            on_time(20.0);

            if self.error_on_call == Some(call) {
                if self.cancel_before_failing {
                    cancel.cancel();
                }
                return Err(anyhow!("broken pipe"));
            }
            if self.fail_on_call == Some(call) {
                if self.cancel_before_failing {
                    cancel.cancel();
                }
                return Ok(RunOutcome {
                    status: RunStatus::Failed,
                    exit_code: Some(1),
                    diagnostic_tail: vec!["Invalid data found when processing input".to_string()],
                });
            }
            if self.cancel_after_call == Some(call) {
                cancel.cancel();
            }
            Ok(RunOutcome { status: RunStatus::Succeeded, exit_code: Some(0), diagnostic_tail: vec![] })
        }
    }

    fn videos(n: usize) -> Vec<MediaFile> {
        (1..=n).map(|i| MediaFile::new(format!("/v/ep{}.mkv", i))).collect()
    }

    fn extract_job(files: Vec<MediaFile>) -> ProcessingJob {
        ProcessingJob::new(
            files,
            Some(PathBuf::from("/out")),
            JobKind::Extract(ExtractSettings { format: AudioFormat::Mp3 }),
        )
    }

    fn durations(files: &[MediaFile], secs: f64) -> HashMap<PathBuf, f64> {
        files.iter().map(|f| (f.path.clone(), secs)).collect()
    }

    async fn drain(mut handle: JobHandle) -> (Vec<JobEvent>, JobOutcome) {
        let mut events = Vec::new();
        while let Some(event) = handle.next_event().await {
            if let JobEvent::Finished(outcome) = event {
                return (events, outcome);
            }
            events.push(event);
        }
        panic!("job ended without a Finished event");
    }

    fn progress_values(events: &[JobEvent]) -> Vec<u8> {
        events.iter().filter_map(|e| match e {
            JobEvent::Progress(p) => Some(*p),
            _ => None,
        }).collect()
    }

    fn statuses(events: &[JobEvent]) -> Vec<String> {
        events.iter().filter_map(|e| match e {
            JobEvent::Status(s) => Some(s.clone()),
            _ => None,
        }).collect()
    }

    #[tokio::test]
    async fn test_extract_batch_completes() {
        let files = videos(3);
        let tools = Arc::new(FakeTools { durations: durations(&files, 40.0), ..Default::default() });
        let handle = spawn_job(extract_job(files), tools.clone(), Arc::new(NoLookup), EngineConfig::default());
        let (events, outcome) = drain(handle).await;

        assert!(outcome.success());
        assert_eq!(outcome.message, "Audio extraction completed!");
        assert_eq!(tools.commands().len(), 3);
        assert_eq!(tools.commands()[0].last().map(String::as_str), Some("/out/ep1.mp3"));

        let progress = progress_values(&events);
        assert!(progress.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(progress.last(), Some(&100));
        assert_eq!(statuses(&events)[0], "(1/3) Extracting from ep1.mkv...");
    }

    #[tokio::test]
    async fn test_cancel_after_second_file() {
        let files = videos(5);
        let tools = Arc::new(FakeTools {
            durations: durations(&files, 40.0),
            cancel_after_call: Some(2),
            ..Default::default()
        });
        let handle = spawn_job(extract_job(files), tools.clone(), Arc::new(NoLookup), EngineConfig::default());
        let (events, outcome) = drain(handle).await;

        assert_eq!(outcome.state, JobState::Cancelled);
        assert!(!outcome.success());
        let commands = tools.commands();
        assert_eq!(commands.len(), 2);
        assert!(commands.iter().all(|c| !c.iter().any(|a| a.contains("ep3") || a.contains("ep4") || a.contains("ep5"))));
        assert!(!progress_values(&events).contains(&100));
    }

    #[tokio::test]
    async fn test_cancel_mid_transcode() {
        let files = videos(3);
        let tools = Arc::new(FakeTools { hang: true, ..Default::default() });
        let handle = spawn_job(extract_job(files), tools.clone(), Arc::new(NoLookup), EngineConfig::default());

        // Wait until the first transcode is running
        while tools.commands().is_empty() {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        handle.cancel();
        let outcome = handle.wait().await.unwrap();

        assert_eq!(outcome.state, JobState::Cancelled);
        assert_eq!(outcome.message, "Job cancelled");
        assert_eq!(tools.commands().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_stops_batch_with_report() {
        let files = videos(4);
        let tools = Arc::new(FakeTools { fail_on_call: Some(2), ..Default::default() });
        let handle = spawn_job(extract_job(files), tools.clone(), Arc::new(NoLookup), EngineConfig::default());
        let (events, outcome) = drain(handle).await;

        assert_eq!(outcome.state, JobState::Failed);
        assert_eq!(outcome.message, "Failed to extract from ep2.mkv");
        let report = outcome.failure.unwrap();
        assert_eq!(report.file, PathBuf::from("/v/ep2.mkv"));
        assert!(report.command.unwrap().starts_with("ffmpeg -i /v/ep2.mkv"));
        assert_eq!(report.output.as_deref(), Some("Invalid data found when processing input"));
        assert_eq!(tools.commands().len(), 2);

        // unknown durations only warn
        let warnings = statuses(&events).iter().filter(|s| s.starts_with("Could not get duration")).count();
        assert_eq!(warnings, 2);
    }

    #[tokio::test]
    async fn test_cancel_wins_over_failure() {
        for tools in [
            FakeTools { fail_on_call: Some(1), cancel_before_failing: true, ..Default::default() },
            FakeTools { error_on_call: Some(1), cancel_before_failing: true, ..Default::default() },
        ] {
            let tools = Arc::new(tools);
            let handle = spawn_job(extract_job(videos(3)), tools.clone(), Arc::new(NoLookup), EngineConfig::default());
            let (_, outcome) = drain(handle).await;

            assert_eq!(outcome.state, JobState::Cancelled);
            assert_eq!(outcome.message, "Job cancelled");
            assert!(outcome.failure.is_none());
            assert_eq!(tools.commands().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_known_duration_skips_failed_probe() {
        let files: Vec<MediaFile> = videos(2)
            .into_iter()
            .map(|mut f| {
                f.duration = 40.0;
                f
            })
            .collect();
        // no probe results: every probe errors
        let tools = Arc::new(FakeTools::default());
        let handle = spawn_job(extract_job(files), tools.clone(), Arc::new(NoLookup), EngineConfig::default());
        let (events, outcome) = drain(handle).await;

        assert!(outcome.success());
        assert!(!statuses(&events).iter().any(|s| s.starts_with("Could not get duration")));
        assert_eq!(progress_values(&events), vec![6, 25, 50, 56, 75, 100]);
    }

    #[tokio::test]
    async fn test_merge_skips_videos_without_companions() {
        let files = vec![MediaFile::new("/v/Show.E01.mkv"), MediaFile::new("/v/Other.mkv")];
        let kind = JobKind::Merge(MergeSettings {
            audio_files: vec![Companion::with_language("/a/show.e01.aac", "eng")],
            preserve_original: true,
        });
        let job = ProcessingJob::new(files, Some(PathBuf::from("/out")), kind);
        let tools = Arc::new(FakeTools::default());
        let (events, outcome) = drain(spawn_job(job, tools.clone(), Arc::new(NoLookup), EngineConfig::default())).await;

        assert!(outcome.success());
        assert_eq!(outcome.message, "Audio merging completed!");
        assert_eq!(tools.commands().len(), 1);
        assert!(tools.commands()[0].contains(&"/a/show.e01.aac".to_string()));
        assert!(statuses(&events).contains(&"No matching audio found for Other.mkv".to_string()));
    }

    #[tokio::test]
    async fn test_invalid_job_fails_without_running() {
        let tools = Arc::new(FakeTools::default());
        let job = extract_job(Vec::new());
        let (_, outcome) = drain(spawn_job(job, tools.clone(), Arc::new(NoLookup), EngineConfig::default())).await;
        assert_eq!(outcome.state, JobState::Failed);
        assert_eq!(outcome.message, "job has no input files");
        assert!(tools.commands().is_empty());
    }

    #[tokio::test]
    async fn test_rename_job_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for name in ["show.s01e01.mkv", "show.s01e02.mkv", "extras.mkv", "Show - S01E03 - .mkv", "show.1x03.mkv"] {
            std::fs::write(root.join(name), b"").unwrap();
        }
        let files: Vec<MediaFile> = ["show.s01e01.mkv", "show.s01e02.mkv", "extras.mkv", "show.1x03.mkv"]
            .iter()
            .map(|n| MediaFile::new(root.join(n)))
            .collect();

        let mut titles = TitleTable::new();
        titles.insert(1, 1, "Pilot");
        let kind = JobKind::Rename(RenameSettings {
            show_name: "Show".to_string(),
            use_api: true,
            ..RenameSettings::default()
        });
        let job = ProcessingJob::new(files, None, kind);
        let (events, outcome) = drain(spawn_job(job, Arc::new(FakeTools::default()), Arc::new(titles), EngineConfig::default())).await;

        assert!(outcome.success());
        assert_eq!(outcome.message, "Bulk renaming completed! Renamed 2 files");
        assert!(root.join("Show - S01E01 - Pilot.mkv").exists());
        assert!(root.join("Show - S01E02 - .mkv").exists());
        // existing target is never overwritten
        assert!(root.join("show.1x03.mkv").exists());
        assert!(root.join("extras.mkv").exists());

        let statuses = statuses(&events);
        assert!(statuses.contains(&"Could not find season/episode in extras.mkv".to_string()));
        assert!(statuses.contains(&"No episode title found for show.s01e02.mkv".to_string()));
        assert!(statuses.iter().any(|s| s.starts_with("Skipping show.1x03.mkv")));
        assert_eq!(progress_values(&events), vec![25, 50, 75, 100]);
    }

    #[tokio::test]
    async fn test_rename_failure_skips_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let gone = root.join("show.s01e01.mkv");
        std::fs::write(&gone, b"").unwrap();
        std::fs::write(root.join("show.s01e02.mkv"), b"").unwrap();
        let files = vec![MediaFile::new(&gone), MediaFile::new(root.join("show.s01e02.mkv"))];
        // removed after the batch was assembled
        std::fs::remove_file(&gone).unwrap();

        let kind = JobKind::Rename(RenameSettings { show_name: "Show".to_string(), ..RenameSettings::default() });
        let job = ProcessingJob::new(files, None, kind);
        let (events, outcome) = drain(spawn_job(job, Arc::new(FakeTools::default()), Arc::new(NoLookup), EngineConfig::default())).await;

        assert!(outcome.success());
        assert_eq!(outcome.message, "Bulk renaming completed! Renamed 1 files");
        assert!(!root.join("Show - S01E01 - .mkv").exists());
        assert!(root.join("Show - S01E02 - .mkv").exists());
        assert!(statuses(&events).iter().any(|s| s.starts_with("Failed to rename show.s01e01.mkv")));
        assert_eq!(progress_values(&events), vec![50, 100]);
    }

    #[tokio::test]
    async fn test_rename_preview_counts_only_free_targets() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for name in ["show.s02e05.mkv", "show.s02e06.mkv", "Show - S02E06 - .mkv"] {
            std::fs::write(root.join(name), b"").unwrap();
        }
        let files = vec![MediaFile::new(root.join("show.s02e05.mkv")), MediaFile::new(root.join("show.s02e06.mkv"))];

        let kind = JobKind::Rename(RenameSettings {
            show_name: "Show".to_string(),
            preview_mode: true,
            ..RenameSettings::default()
        });
        let job = ProcessingJob::new(files, None, kind);
        let (_, outcome) = drain(spawn_job(job, Arc::new(FakeTools::default()), Arc::new(NoLookup), EngineConfig::default())).await;

        assert!(outcome.success());
        assert!(outcome.message.ends_with("Preview completed (1 file(s) would be renamed)"));
    }

    #[tokio::test]
    async fn test_rename_preview_leaves_files_alone() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("show.s02e05.mkv");
        std::fs::write(&source, b"").unwrap();

        let kind = JobKind::Rename(RenameSettings {
            show_name: "Show".to_string(),
            preview_mode: true,
            ..RenameSettings::default()
        });
        let job = ProcessingJob::new(vec![MediaFile::new(&source)], None, kind);
        let (events, outcome) = drain(spawn_job(job, Arc::new(FakeTools::default()), Arc::new(NoLookup), EngineConfig::default())).await;

        assert!(outcome.success());
        assert!(outcome.message.contains("Preview completed"));
        assert!(source.exists());
        assert!(statuses(&events).contains(&"Preview: show.s02e05.mkv → Show - S02E05 - .mkv".to_string()));
    }
}
