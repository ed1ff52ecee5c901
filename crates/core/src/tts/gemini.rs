use crate::decode::{decode_base64_pcm, TTS_CHANNELS, TTS_SAMPLE_RATE_HZ};
use crate::genai::{GeminiClient, GenerateContentRequest, GenerationConfig, SpeechConfig};
use crate::tts::{TtsAudio, TtsClient, TtsError, TtsRequest};
use futures::future::BoxFuture;
use futures::FutureExt;

const SPEAKING_STYLE: &str = "Say with a clear and professional tone: ";

#[derive(Clone)]
pub struct GeminiTtsClient {
    client: GeminiClient,
    model: String,
}

impl GeminiTtsClient {
    pub fn new<S: Into<String>>(client: GeminiClient, model: S) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

impl TtsClient for GeminiTtsClient {
    fn synthesize(&self, request: TtsRequest) -> BoxFuture<'_, Result<TtsAudio, TtsError>> {
        async move {
            let body = GenerateContentRequest::from_prompt(format!("{SPEAKING_STYLE}{}", request.text))
                .with_generation_config(GenerationConfig {
                    response_modalities: Some(vec!["AUDIO".to_owned()]),
                    speech_config: Some(SpeechConfig::prebuilt(request.voice.as_str())),
                    ..Default::default()
                });

            let response = self.client.generate_content(&self.model, &body).await?;
            let inline = response.inline_data().ok_or(TtsError::NoAudio)?;
            let pcm_i16 = decode_base64_pcm(&inline.data)?;
            if pcm_i16.is_empty() {
                return Err(TtsError::NoAudio);
            }

            tracing::debug!(
                samples = pcm_i16.len(),
                mime_type = %inline.mime_type,
                "speech synthesized"
            );
            Ok(TtsAudio {
                sample_rate_hz: TTS_SAMPLE_RATE_HZ,
                channels: TTS_CHANNELS,
                pcm_i16,
            })
        }
        .boxed()
    }
}
