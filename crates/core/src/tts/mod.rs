mod gemini;

use crate::config::AiVoice;
use crate::decode::{duration_of, PcmFormat};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use gemini::GeminiTtsClient;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TtsRequest {
    pub text: String,
    pub voice: AiVoice,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TtsAudio {
    pub sample_rate_hz: u32,
    pub channels: u16,
    pub pcm_i16: Vec<i16>,
}

impl TtsAudio {
    pub fn format(&self) -> PcmFormat {
        PcmFormat {
            sample_rate: self.sample_rate_hz,
            channels: self.channels,
        }
    }

    pub fn duration(&self) -> Duration {
        duration_of(self.format(), self.pcm_i16.len())
    }

    pub fn is_empty(&self) -> bool {
        self.pcm_i16.is_empty()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum TtsError {
    #[error(transparent)]
    GenAi(#[from] crate::genai::GenAiError),

    #[error(transparent)]
    Decode(#[from] crate::decode::DecodeError),

    #[error("speech service returned no audio")]
    NoAudio,
}

pub trait TtsClient: Send + Sync {
    fn synthesize(&self, request: TtsRequest) -> BoxFuture<'_, Result<TtsAudio, TtsError>>;
}
