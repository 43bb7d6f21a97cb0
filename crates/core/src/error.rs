use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MomentclipError {
    #[error("ffmpeg not found in PATH")]
    TranscoderNotFound,

    #[error("Transcoder is not loaded")]
    TranscoderNotLoaded,

    #[error("ffmpeg failed ({exit_code:?}): {reason}")]
    TranscodeFailed {
        exit_code: Option<i32>,
        reason: String,
    },

    #[error("Path escapes the transcoder workspace: {name}")]
    InvalidWorkspacePath { name: String },

    #[error("Duration could not be determined for {name}")]
    DurationUndeterminable { name: String },

    #[error("Invalid duration: {0}")]
    InvalidDuration(f64),

    #[error("Download failed for {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("Source video not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("Transcription failed ({provider}): {reason}")]
    TranscriptionFailed { provider: String, reason: String },

    #[error("Vision request failed for workflow {workflow} ({status}): {reason}")]
    VisionFailed {
        workflow: String,
        status: u16,
        reason: String,
    },

    #[error("Missing API key: {env_var} environment variable is not set")]
    MissingApiKey { env_var: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),
}

impl MomentclipError {
    pub fn transcode_failed(reason: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self::TranscodeFailed {
            exit_code,
            reason: reason.into(),
        }
    }

    pub fn transcription_failed(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TranscriptionFailed {
            provider: provider.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MomentclipError>;
