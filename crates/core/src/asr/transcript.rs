use crate::asr::{RecognitionResult, SpeechRecognizer};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

struct TranscriptState {
    generation: u64,
    listening: bool,
    text: String,
}

struct Shared {
    state: Mutex<TranscriptState>,
    live: watch::Sender<String>,
}

impl Shared {
    fn state(&self) -> std::sync::MutexGuard<'_, TranscriptState> {
        match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn set_text(&self, state: &mut TranscriptState, text: String) {
        state.text = text;
        self.live.send_replace(state.text.clone());
    }
}

/// Handle a [`SpeechRecognizer`] pushes result lists into.
///
/// Each sink belongs to one capture; once that capture is stopped or a new one has
/// started, its updates are dropped.
#[derive(Clone)]
pub struct TranscriptSink {
    shared: Arc<Shared>,
    generation: u64,
}

impl TranscriptSink {
    /// Rebuilds the transcript from the complete result list.
    pub fn update(&self, results: &[RecognitionResult]) {
        let mut state = self.shared.state();
        if !state.listening || state.generation != self.generation {
            tracing::trace!(generation = self.generation, "dropping stale recognition update");
            return;
        }
        let text = assemble(results);
        self.shared.set_text(&mut state, text);
    }
}

/// Finalized segments first, then in-progress ones, each group in list order.
pub fn assemble(results: &[RecognitionResult]) -> String {
    let mut finals = String::new();
    let mut interims = String::new();
    for r in results {
        if r.is_final {
            finals.push_str(&r.transcript);
        } else {
            interims.push_str(&r.transcript);
        }
    }
    finals.push_str(&interims);
    finals
}

/// Accumulates the answer transcript of the current turn.
pub struct TranscriptSource<R: ?Sized> {
    recognizer: Arc<R>,
    shared: Arc<Shared>,
}

impl<R> TranscriptSource<R>
where
    R: SpeechRecognizer + ?Sized,
{
    pub fn new(recognizer: Arc<R>) -> Self {
        let (live, _) = watch::channel(String::new());
        Self {
            recognizer,
            shared: Arc::new(Shared {
                state: Mutex::new(TranscriptState {
                    generation: 0,
                    listening: false,
                    text: String::new(),
                }),
                live,
            }),
        }
    }

    pub fn live(&self) -> watch::Receiver<String> {
        self.shared.live.subscribe()
    }

    pub fn is_listening(&self) -> bool {
        self.shared.state().listening
    }

    pub fn transcript(&self) -> String {
        self.shared.state().text.clone()
    }

    /// Resets the transcript and opens a new capture.
    ///
    /// A recognizer that fails to start leaves the capture open with an empty
    /// transcript; the turn still completes.
    pub async fn start(&self) {
        let sink = {
            let mut state = self.shared.state();
            state.generation += 1;
            state.listening = true;
            self.shared.set_text(&mut state, String::new());
            TranscriptSink {
                shared: Arc::clone(&self.shared),
                generation: state.generation,
            }
        };
        if let Err(e) = self.recognizer.start(sink).await {
            tracing::warn!(error = %e, "speech recognizer failed to start; answer will be empty");
        }
    }

    /// Closes the capture and returns the transcript as of this call.
    pub async fn stop(&self) -> String {
        let text = {
            let mut state = self.shared.state();
            state.listening = false;
            state.text.clone()
        };
        if let Err(e) = self.recognizer.stop().await {
            tracing::warn!(error = %e, "speech recognizer failed to stop cleanly");
        }
        text
    }

    /// Empties the transcript without touching the stream.
    pub fn clear(&self) {
        let mut state = self.shared.state();
        self.shared.set_text(&mut state, String::new());
    }
}
