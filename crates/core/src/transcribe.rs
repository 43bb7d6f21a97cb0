//! Speech-to-text collaborators.

use async_trait::async_trait;
use reqwest::{
    header::AUTHORIZATION,
    multipart::{Form, Part},
};
use serde::Deserialize;
use tracing::info;

use crate::{
    error::{MomentclipError, Result},
    provider::Provider,
};

#[async_trait]
pub trait Transcriber: Send + Sync {
    fn name(&self) -> &str;

    /// Turn a WAV payload into plain transcript text.
    async fn transcribe(&self, audio: Vec<u8>, file_name: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Multipart upload to an OpenAI-compatible `audio/transcriptions` endpoint.
pub struct HostedTranscriber {
    http: reqwest::Client,
    provider: Provider,
    api_key: String,
    api_url: String,
}

impl HostedTranscriber {
    pub fn new(http: reqwest::Client, provider: Provider, api_key: impl Into<String>) -> Self {
        let api_url = provider.config().api_url.to_string();
        Self {
            http,
            provider,
            api_key: api_key.into(),
            api_url,
        }
    }

    /// Build a transcriber with the provider's key from the environment.
    pub fn from_env(http: reqwest::Client, provider: Provider) -> Result<Self> {
        let api_key = provider.validate_api_key()?;
        Ok(Self::new(http, provider, api_key))
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

#[async_trait]
impl Transcriber for HostedTranscriber {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn transcribe(&self, audio: Vec<u8>, file_name: &str) -> Result<String> {
        info!(
            "Transcribing {} ({} bytes) with {}",
            file_name,
            audio.len(),
            self.provider.name()
        );

        let file_part = Part::bytes(audio)
            .file_name(file_name.to_string())
            .mime_str("audio/wav")?;
        let form = Form::new()
            .part("file", file_part)
            .text("model", self.provider.config().model);

        let response = self
            .http
            .post(&self.api_url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(MomentclipError::transcription_failed(
                self.provider.name(),
                format!("{}: {}", status, text),
            ));
        }

        let transcription: TranscriptionResponse = response.json().await?;
        Ok(transcription.text)
    }
}

#[cfg(feature = "local-whisper")]
pub use local::{LocalWhisper, MODEL_NAME, ensure_model};

#[cfg(feature = "local-whisper")]
mod local {
    use std::{
        io::Cursor,
        path::{Path, PathBuf},
    };

    use async_trait::async_trait;
    use tokio::fs;
    use tracing::info;
    use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

    use super::Transcriber;
    use crate::{
        cache::get_model_dir,
        error::{MomentclipError, Result},
    };

    pub const MODEL_NAME: &str = "ggml-medium-q5_0.bin";

    /// Download the ggml model into the cache on first use.
    pub async fn ensure_model(cache_dir: &Path) -> Result<PathBuf> {
        let download_url = format!(
            "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/{}",
            MODEL_NAME
        );
        let model_dir = get_model_dir(cache_dir);

        if !model_dir.exists() {
            fs::create_dir_all(&model_dir).await?;
        }

        let model_path = model_dir.join(MODEL_NAME);
        if !model_path.exists() {
            info!("Downloading Whisper model from {}", download_url);
            let response = reqwest::get(&download_url).await?;
            if !response.status().is_success() {
                return Err(MomentclipError::DownloadFailed {
                    url: download_url,
                    reason: response.status().to_string(),
                });
            }
            let bytes = response.bytes().await?;
            fs::write(&model_path, &bytes).await?;
        }

        Ok(model_path)
    }

    /// Whisper running in-process through whisper.cpp.
    pub struct LocalWhisper {
        model_path: PathBuf,
    }

    impl LocalWhisper {
        pub fn new(model_path: PathBuf) -> Self {
            Self { model_path }
        }

        fn run(model_path: &Path, audio: &[u8]) -> Result<String> {
            let failed = |reason: String| MomentclipError::transcription_failed("Whisper", reason);

            let mut reader =
                hound::WavReader::new(Cursor::new(audio)).map_err(|e| failed(e.to_string()))?;
            let samples = reader
                .samples::<i16>()
                .map(|s| s.map(|s| s as f32 / i16::MAX as f32))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| failed(e.to_string()))?;

            let ctx_params = WhisperContextParameters {
                use_gpu: true,
                flash_attn: true,
                ..Default::default()
            };
            let model_path_str = model_path.to_string_lossy();
            let ctx = WhisperContext::new_with_params(&model_path_str, ctx_params)
                .map_err(|e| failed(e.to_string()))?;

            let params = FullParams::new(SamplingStrategy::Greedy { best_of: 5 });
            let mut state = ctx.create_state().map_err(|e| failed(e.to_string()))?;
            state
                .full(params, &samples)
                .map_err(|e| failed(e.to_string()))?;

            let mut text = String::new();
            for segment in state.as_iter() {
                if let Ok(seg_text) = segment.to_str() {
                    text.push_str(seg_text);
                }
            }

            Ok(text.trim().to_string())
        }
    }

    #[async_trait]
    impl Transcriber for LocalWhisper {
        fn name(&self) -> &str {
            "Whisper (local)"
        }

        async fn transcribe(&self, audio: Vec<u8>, file_name: &str) -> Result<String> {
            info!("Transcribing {} locally", file_name);
            let model_path = self.model_path.clone();
            tokio::task::spawn_blocking(move || Self::run(&model_path, &audio))
                .await
                .map_err(|e| MomentclipError::transcription_failed("Whisper", e.to_string()))?
        }
    }
}
