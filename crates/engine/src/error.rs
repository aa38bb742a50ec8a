use thiserror::Error;

/// Reasons a filename template could not be rendered.
///
/// These never reach the batch: the templater falls back to the fixed format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unknown token '{{{0}}}'")]
    UnknownToken(String),
    #[error("unbalanced brace at byte {0}")]
    UnbalancedBrace(usize),
    #[error("format spec '{spec}' is not valid for token '{token}'")]
    BadFormatSpec { token: String, spec: String },
}

/// Job construction and validation errors
#[derive(Debug, Error)]
pub enum JobError {
    #[error("job has no input files")]
    NoInputFiles,
    #[error("job kind '{0}' requires an output directory")]
    MissingOutputDirectory(&'static str),
    #[error("unknown job kind '{0}'")]
    UnknownKind(String),
    #[error("invalid settings for '{kind}' job: {source}")]
    InvalidSettings {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}
