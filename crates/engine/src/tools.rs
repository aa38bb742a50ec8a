use std::future::Future;
use std::path::Path;
use anyhow::Result;
use tokio_util::sync::CancellationToken;
use crate::config::EngineConfig;
use crate::ffprobe::{probe_file, FFProbeData};
use crate::runner::{run_command, RunOutcome, RunnerOptions};

/// External media tools the orchestrator drives
pub trait MediaTools: Send + Sync + 'static {
    /// Stream and format metadata for one file
    fn probe(&self, path: &Path) -> impl Future<Output = Result<FFProbeData>> + Send;

    /// Run a transcoder command (program first), reporting elapsed seconds
    /// from its diagnostic stream through `on_time`
    fn transcode(
        &self,
        args: &[String],
        cancel: &CancellationToken,
        on_time: &mut (dyn FnMut(f64) + Send),
    ) -> impl Future<Output = Result<RunOutcome>> + Send;
}

/// ffmpeg/ffprobe as configured in [`EngineConfig`]
#[derive(Debug, Clone)]
pub struct FfmpegTools {
    config: EngineConfig,
    options: RunnerOptions,
}

impl FfmpegTools {
    pub fn new(config: EngineConfig) -> Self {
        let options = RunnerOptions::from_config(&config);
        Self { config, options }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl MediaTools for FfmpegTools {
    async fn probe(&self, path: &Path) -> Result<FFProbeData> {
        probe_file(&self.config, path).await
    }

    async fn transcode(
        &self,
        args: &[String],
        cancel: &CancellationToken,
        on_time: &mut (dyn FnMut(f64) + Send),
    ) -> Result<RunOutcome> {
        run_command(args, &self.options, cancel, on_time).await
    }
}
