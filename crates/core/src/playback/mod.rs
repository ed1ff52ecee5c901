#[cfg(feature = "rodio")]
mod audio;
mod null;

use crate::tts::TtsAudio;
use futures::future::BoxFuture;

#[cfg(feature = "rodio")]
pub use audio::AudioPlaybackSink;
pub use null::NullPlaybackSink;

#[derive(thiserror::Error, Debug)]
pub enum PlaybackError {
    #[error("audio output unavailable: {details}")]
    AudioOutputUnavailable { details: String },

    #[error("playback task failed: {0}")]
    Task(String),
}

/// Plays synthesized speech. The returned future resolves once playback has ended.
pub trait PlaybackSink: Send + Sync {
    fn play(&self, audio: TtsAudio) -> BoxFuture<'_, Result<(), PlaybackError>>;
}
