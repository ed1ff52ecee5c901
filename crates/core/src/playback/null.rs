use crate::playback::{PlaybackError, PlaybackSink};
use crate::tts::TtsAudio;
use futures::future::BoxFuture;
use futures::FutureExt;

/// Discards audio. Playback "ends" as soon as it starts.
#[derive(Clone, Debug, Default)]
pub struct NullPlaybackSink;

impl NullPlaybackSink {
    pub fn new() -> Self {
        Self
    }
}

impl PlaybackSink for NullPlaybackSink {
    fn play(&self, audio: TtsAudio) -> BoxFuture<'_, Result<(), PlaybackError>> {
        async move {
            tracing::trace!(
                duration_ms = audio.duration().as_millis() as u64,
                "discarding synthesized audio"
            );
            Ok(())
        }
        .boxed()
    }
}
