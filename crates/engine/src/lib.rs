pub mod command;
pub mod companion;
pub mod config;
pub mod episode;
pub mod error;
pub mod ffprobe;
pub mod job;
pub mod languages;
pub mod media;
pub mod metadata;
pub mod orchestrator;
pub mod progress;
pub mod rename;
pub mod runner;
pub mod scan;
pub mod template;
pub mod tools;

pub use config::EngineConfig;
pub use companion::Companion;
pub use error::{JobError, TemplateError};
pub use ffprobe::{FFProbeData, FFProbeFormat, FFProbeStream};
pub use job::{JobEvent, JobKind, JobOutcome, JobState, ProcessingJob};
pub use media::MediaFile;
pub use orchestrator::{spawn_job, JobHandle};
pub use tools::{FfmpegTools, MediaTools};
