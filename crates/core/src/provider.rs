use crate::error::{MomentclipError, Result};

/// Hosted speech-to-text endpoints speaking the OpenAI transcription protocol.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Provider {
    #[default]
    Openai,
    Groq,
}

pub struct ProviderConfig {
    pub api_url: &'static str,
    pub model: &'static str,
    pub env_var: &'static str,
}

impl Provider {
    pub fn config(&self) -> ProviderConfig {
        match self {
            Provider::Openai => ProviderConfig {
                api_url: "https://api.openai.com/v1/audio/transcriptions",
                model: "whisper-1",
                env_var: "OPENAI_API_KEY",
            },
            Provider::Groq => ProviderConfig {
                api_url: "https://api.groq.com/openai/v1/audio/transcriptions",
                model: "whisper-large-v3",
                env_var: "GROQ_API_KEY",
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Openai => "OpenAI",
            Provider::Groq => "Groq",
        }
    }

    /// Validate that the API key is set for this provider
    pub fn validate_api_key(&self) -> Result<String> {
        let config = self.config();
        std::env::var(config.env_var).map_err(|_| MomentclipError::MissingApiKey {
            env_var: config.env_var.to_string(),
        })
    }
}
