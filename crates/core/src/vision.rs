//! Vision-analysis collaborator backed by hosted Clarifai workflows.

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::header::AUTHORIZATION;
use serde_json::json;
use tracing::{debug, info};

use crate::{
    config::ServiceConfig,
    error::{MomentclipError, Result},
    types::{AnalysisResult, ClipAnalysis},
};

pub const CLARIFAI_PAT_ENV: &str = "CLARIFAI_PAT";

/// Hosted scoring pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workflow {
    Emotion,
    FaceDetection,
    General,
}

impl Workflow {
    pub fn name(&self) -> &'static str {
        match self {
            Workflow::Emotion => "emotion",
            Workflow::FaceDetection => "face-detection",
            Workflow::General => "general",
        }
    }

    pub fn default_url(&self) -> &'static str {
        match self {
            Workflow::Emotion => {
                "https://api.clarifai.com/v2/workflows/emotion/workflows/face-sentiment-recognition-workflow-jlj161"
            }
            Workflow::FaceDetection => {
                "https://api.clarifai.com/v2/workflows/face-detection/workflows/face-detection-workflow-5cbii"
            }
            Workflow::General => {
                "https://api.clarifai.com/v2/workflows/general/workflows/general-image-recognition-workflow-3d5qu"
            }
        }
    }
}

/// Media handed to a workflow: a URL pointing at the video file, or the
/// bytes themselves.
#[derive(Debug, Clone, Copy)]
pub enum MediaInput<'a> {
    Url(&'a str),
    Video(&'a [u8]),
}

impl MediaInput<'_> {
    fn request_body(&self) -> serde_json::Value {
        let video = match self {
            MediaInput::Url(url) => json!({ "url": url }),
            MediaInput::Video(bytes) => json!({ "base64": STANDARD.encode(bytes) }),
        };
        json!({ "inputs": [{ "data": { "video": video } }] })
    }
}

#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    async fn analyze(&self, media: &MediaInput<'_>, workflow: Workflow) -> Result<AnalysisResult>;
}

/// Run the emotion, face and general workflows, one after another.
pub async fn analyze_all(
    analyzer: &dyn VisionAnalyzer,
    media: &MediaInput<'_>,
) -> Result<ClipAnalysis> {
    let emotion_analysis = analyzer.analyze(media, Workflow::Emotion).await?;
    let face_analysis = analyzer.analyze(media, Workflow::FaceDetection).await?;
    let general_analysis = analyzer.analyze(media, Workflow::General).await?;

    Ok(ClipAnalysis {
        emotion_analysis,
        face_analysis,
        general_analysis,
    })
}

pub struct ClarifaiClient {
    http: reqwest::Client,
    pat: String,
    config: ServiceConfig,
}

impl ClarifaiClient {
    pub fn new(http: reqwest::Client, pat: impl Into<String>, config: ServiceConfig) -> Self {
        Self {
            http,
            pat: pat.into(),
            config,
        }
    }
}

/// Validate that the Clarifai personal access token is set
pub fn validate_pat() -> Result<String> {
    std::env::var(CLARIFAI_PAT_ENV).map_err(|_| MomentclipError::MissingApiKey {
        env_var: CLARIFAI_PAT_ENV.to_string(),
    })
}

#[async_trait]
impl VisionAnalyzer for ClarifaiClient {
    async fn analyze(&self, media: &MediaInput<'_>, workflow: Workflow) -> Result<AnalysisResult> {
        let url = self.config.workflow_url(workflow);
        info!("Analyzing media with {} workflow", workflow.name());
        debug!("POST {}", url);

        let response = self
            .http
            .post(url)
            .header(AUTHORIZATION, format!("Key {}", self.pat))
            .json(&media.request_body())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let reason = response.text().await.unwrap_or_default();
            return Err(MomentclipError::VisionFailed {
                workflow: workflow.name().to_string(),
                status: status.as_u16(),
                reason,
            });
        }

        Ok(response.json::<AnalysisResult>().await?)
    }
}
