//! Pipeline configuration.

use std::time::Duration;

use tracing::warn;

use crate::vision::Workflow;

pub const CLIP_DURATION_SECS: f64 = 30.0;
pub const CLIP_WIDTH: u32 = 1080;
pub const CLIP_HEIGHT: u32 = 1920;
pub const CONFIDENCE_THRESHOLD: f64 = 0.8;
pub const FIXED_RATIOS: [f64; 5] = [0.1, 0.3, 0.5, 0.7, 0.9];
/// Synthetic window given to every subtitle cue
pub const CUE_SECONDS: f64 = 2.0;

/// What to do when transcription or subtitle burning fails for a clip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubtitlePolicy {
    /// Fail the whole run
    #[default]
    Required,
    /// Log and keep the clip without subtitles
    BestEffort,
}

/// Clip geometry and stage knobs shared by the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub clip_duration: f64,
    pub clip_width: u32,
    pub clip_height: u32,
    pub subtitles: SubtitlePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            clip_duration: CLIP_DURATION_SECS,
            clip_width: CLIP_WIDTH,
            clip_height: CLIP_HEIGHT,
            subtitles: SubtitlePolicy::default(),
        }
    }
}

/// Settings for the hosted collaborators, read from the environment.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub emotion_workflow_url: String,
    pub face_workflow_url: String,
    pub general_workflow_url: String,
    pub confidence_threshold: f64,
    /// `None` waits forever
    pub request_timeout: Option<Duration>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            emotion_workflow_url: Workflow::Emotion.default_url().to_string(),
            face_workflow_url: Workflow::FaceDetection.default_url().to_string(),
            general_workflow_url: Workflow::General.default_url().to_string(),
            confidence_threshold: CONFIDENCE_THRESHOLD,
            request_timeout: None,
        }
    }
}

/// Read an optional setting, warning when it is present but unusable.
fn env_setting<T>(name: &str, parse: fn(&str) -> Option<T>) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    let parsed = parse(raw.trim());
    if parsed.is_none() {
        warn!("Ignoring invalid {}={:?}", name, raw);
    }
    parsed
}

/// A concept confidence in `[0, 1]`.
fn parse_threshold(value: &str) -> Option<f64> {
    value
        .parse::<f64>()
        .ok()
        .filter(|t| (0.0..=1.0).contains(t))
}

/// Seconds, fractional allowed, strictly positive.
fn parse_timeout(value: &str) -> Option<Duration> {
    value
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .map(Duration::from_secs_f64)
}

impl ServiceConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            emotion_workflow_url: std::env::var("MOMENTCLIP_EMOTION_WORKFLOW_URL")
                .unwrap_or(defaults.emotion_workflow_url),
            face_workflow_url: std::env::var("MOMENTCLIP_FACE_WORKFLOW_URL")
                .unwrap_or(defaults.face_workflow_url),
            general_workflow_url: std::env::var("MOMENTCLIP_GENERAL_WORKFLOW_URL")
                .unwrap_or(defaults.general_workflow_url),
            confidence_threshold: env_setting(
                "MOMENTCLIP_CONFIDENCE_THRESHOLD",
                parse_threshold,
            )
            .unwrap_or(defaults.confidence_threshold),
            request_timeout: env_setting("MOMENTCLIP_REQUEST_TIMEOUT", parse_timeout),
        }
    }

    pub fn workflow_url(&self, workflow: Workflow) -> &str {
        match workflow {
            Workflow::Emotion => &self.emotion_workflow_url,
            Workflow::FaceDetection => &self.face_workflow_url,
            Workflow::General => &self.general_workflow_url,
        }
    }

    pub fn http_client(&self) -> reqwest::Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }
        builder.build()
    }
}
