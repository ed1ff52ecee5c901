//! Wire types and client for the Gemini `generateContent` REST endpoint.

mod client;

use serde::{Deserialize, Serialize};

pub use client::GeminiClient;

#[derive(thiserror::Error, Debug)]
pub enum GenAiError {
    #[error("http error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("gemini api error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid gemini response: {0}")]
    InvalidResponse(String),

    #[error("gemini returned no usable content")]
    EmptyResponse,
}

impl GenAiError {
    pub fn is_retryable(&self) -> bool {
        match self {
            GenAiError::Network(e) => e.is_timeout() || e.is_connect(),
            GenAiError::Api { status, .. } => crate::util::is_http_retryable(*status),
            _ => false,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    pub fn from_prompt<S: Into<String>>(prompt: S) -> Self {
        Self {
            contents: vec![Content::user(prompt)],
            ..Default::default()
        }
    }

    pub fn with_system_instruction<S: Into<String>>(mut self, text: S) -> Self {
        self.system_instruction = Some(Content {
            role: None,
            parts: vec![Part::text(text)],
        });
        self
    }

    pub fn with_generation_config(mut self, config: GenerationConfig) -> Self {
        self.generation_config = Some(config);
        self
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user<S: Into<String>>(text: S) -> Self {
        Self {
            role: Some("user".to_owned()),
            parts: vec![Part::text(text)],
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default)]
    pub mime_type: String,
    /// Base64 payload.
    pub data: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

impl SpeechConfig {
    pub fn prebuilt<S: Into<String>>(voice_name: S) -> Self {
        Self {
            voice_config: VoiceConfig {
                prebuilt_voice_config: PrebuiltVoiceConfig {
                    voice_name: voice_name.into(),
                },
            },
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

impl GenerateContentResponse {
    fn first_parts(&self) -> impl Iterator<Item = &Part> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .into_iter()
            .flat_map(|c| c.parts.iter())
    }

    /// Concatenated text of the first candidate, trimmed. `None` when there is none.
    pub fn text(&self) -> Option<String> {
        let text: String = self.first_parts().filter_map(|p| p.text.as_deref()).collect();
        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_owned())
        }
    }

    pub fn inline_data(&self) -> Option<&InlineData> {
        self.first_parts().find_map(|p| p.inline_data.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_uses_camel_case_and_skips_empty_fields() {
        let req = GenerateContentRequest::from_prompt("hi")
            .with_system_instruction("be brief")
            .with_generation_config(GenerationConfig {
                temperature: Some(0.5),
                ..Default::default()
            });
        let v = serde_json::to_value(&req).expect("serialize");
        assert_eq!(v["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(v["systemInstruction"]["parts"][0]["text"], "be brief");
        assert!(v["systemInstruction"].get("role").is_none());
        assert_eq!(v["generationConfig"]["temperature"], 0.5);
        assert!(v["generationConfig"].get("responseSchema").is_none());
    }

    #[test]
    fn speech_config_nests_prebuilt_voice() {
        let v = serde_json::to_value(SpeechConfig::prebuilt("Kore")).expect("serialize");
        assert_eq!(v, json!({"voiceConfig": {"prebuiltVoiceConfig": {"voiceName": "Kore"}}}));
    }

    #[test]
    fn response_text_joins_parts_of_first_candidate() {
        let resp: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": "  Tell me "}, {"text": "about yourself.\n"}]}},
                {"content": {"parts": [{"text": "ignored"}]}}
            ]
        }))
        .expect("deserialize");
        assert_eq!(resp.text().as_deref(), Some("Tell me about yourself."));
    }

    #[test]
    fn response_without_candidates_has_no_text() {
        let resp: GenerateContentResponse = serde_json::from_value(json!({})).expect("deserialize");
        assert!(resp.text().is_none());
        assert!(resp.inline_data().is_none());
    }

    #[test]
    fn inline_data_is_found_among_parts() {
        let resp: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [
                {"text": ""},
                {"inlineData": {"mimeType": "audio/L16;codec=pcm;rate=24000", "data": "AAA="}}
            ]}}]
        }))
        .expect("deserialize");
        assert_eq!(resp.inline_data().map(|d| d.data.as_str()), Some("AAA="));
    }
}
