use crate::asr::{AsrError, RecognitionResult, SpeechRecognizer, TranscriptSink};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Mutex;

struct Capture {
    sink: TranscriptSink,
    results: Vec<RecognitionResult>,
}

/// Treats each typed line as a finalized recognition segment.
#[derive(Default)]
pub struct LineRecognizer {
    capture: Mutex<Option<Capture>>,
}

impl LineRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one line of text. Returns `false` when no capture is open.
    pub fn feed(&self, line: &str) -> bool {
        let line = line.trim();
        let mut guard = match self.capture.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Some(capture) = guard.as_mut() else {
            return false;
        };
        if line.is_empty() {
            return true;
        }
        let text = if capture.results.is_empty() {
            line.to_owned()
        } else {
            format!(" {line}")
        };
        capture.results.push(RecognitionResult::final_text(text));
        capture.sink.update(&capture.results);
        true
    }

    fn set(&self, capture: Option<Capture>) {
        match self.capture.lock() {
            Ok(mut g) => *g = capture,
            Err(poisoned) => *poisoned.into_inner() = capture,
        }
    }
}

impl SpeechRecognizer for LineRecognizer {
    fn start(&self, sink: TranscriptSink) -> BoxFuture<'_, Result<(), AsrError>> {
        async move {
            self.set(Some(Capture {
                sink,
                results: Vec::new(),
            }));
            Ok(())
        }
        .boxed()
    }

    fn stop(&self) -> BoxFuture<'_, Result<(), AsrError>> {
        async move {
            self.set(None);
            Ok(())
        }
        .boxed()
    }
}
