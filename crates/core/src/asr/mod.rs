mod line;
mod transcript;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

pub use line::LineRecognizer;
pub use transcript::{TranscriptSink, TranscriptSource};

/// One entry of the recognizer's current result list.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecognitionResult {
    pub transcript: String,
    pub is_final: bool,
}

impl RecognitionResult {
    pub fn final_text<S: Into<String>>(text: S) -> Self {
        Self {
            transcript: text.into(),
            is_final: true,
        }
    }

    pub fn interim<S: Into<String>>(text: S) -> Self {
        Self {
            transcript: text.into(),
            is_final: false,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AsrError {
    #[error("speech recognition unavailable: {0}")]
    Unavailable(String),

    #[error("speech recognition failed: {0}")]
    Failed(String),
}

/// Opaque continuous speech-to-text stream.
///
/// After `start`, every recognition update must push the *whole* current result list
/// into the sink, not only the newest segment: earlier interim entries may have been
/// revised into final ones.
pub trait SpeechRecognizer: Send + Sync {
    fn start(&self, sink: TranscriptSink) -> BoxFuture<'_, Result<(), AsrError>>;

    fn stop(&self) -> BoxFuture<'_, Result<(), AsrError>>;
}
