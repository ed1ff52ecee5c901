mod detector;
mod sampler;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

pub use detector::{NoFaceDetector, ReplayFaceDetector};
pub use sampler::{EmotionSampler, TickOutcome};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Emotion {
    Neutral,
    Happy,
    Sad,
    Angry,
    Fearful,
    Disgusted,
    Surprised,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Emotion::Neutral,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Fearful,
        Emotion::Disgusted,
        Emotion::Surprised,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Fearful => "fearful",
            Emotion::Disgusted => "disgusted",
            Emotion::Surprised => "surprised",
        }
    }
}

/// One instantaneous reading of expression probabilities.
///
/// Values are clamped into `[0, 1]` on construction; they need not sum to 1.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmotionSnapshot {
    pub neutral: f32,
    pub happy: f32,
    pub sad: f32,
    pub angry: f32,
    pub fearful: f32,
    pub disgusted: f32,
    pub surprised: f32,
}

impl EmotionSnapshot {
    /// Shown on the live display when the detector sees no face.
    pub const NEUTRAL: EmotionSnapshot = EmotionSnapshot {
        neutral: 1.0,
        happy: 0.0,
        sad: 0.0,
        angry: 0.0,
        fearful: 0.0,
        disgusted: 0.0,
        surprised: 0.0,
    };

    pub fn from_fn(mut f: impl FnMut(Emotion) -> f32) -> Self {
        let mut snapshot = Self::default();
        for emotion in Emotion::ALL {
            snapshot.set(emotion, f(emotion));
        }
        snapshot
    }

    pub fn get(&self, emotion: Emotion) -> f32 {
        match emotion {
            Emotion::Neutral => self.neutral,
            Emotion::Happy => self.happy,
            Emotion::Sad => self.sad,
            Emotion::Angry => self.angry,
            Emotion::Fearful => self.fearful,
            Emotion::Disgusted => self.disgusted,
            Emotion::Surprised => self.surprised,
        }
    }

    fn set(&mut self, emotion: Emotion, value: f32) {
        let value = if value.is_finite() {
            value.clamp(0.0, 1.0)
        } else {
            0.0
        };
        match emotion {
            Emotion::Neutral => self.neutral = value,
            Emotion::Happy => self.happy = value,
            Emotion::Sad => self.sad = value,
            Emotion::Angry => self.angry = value,
            Emotion::Fearful => self.fearful = value,
            Emotion::Disgusted => self.disgusted = value,
            Emotion::Surprised => self.surprised = value,
        }
    }

    /// Re-clamps every channel, for values that arrived through deserialization.
    pub fn normalized(self) -> Self {
        Self::from_fn(|e| self.get(e))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Emotion, f32)> + '_ {
        Emotion::ALL.into_iter().map(move |e| (e, self.get(e)))
    }
}

/// Camera permission / device status, surfaced as a flag rather than an error.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum CameraState {
    #[default]
    Idle,
    Granted,
    Denied,
}

#[derive(thiserror::Error, Debug)]
pub enum EmotionError {
    #[error("face detection failed: {0}")]
    Detection(String),

    #[error("emotion trace line {line}: {message}")]
    Trace { line: usize, message: String },

    #[error("emotion trace io: {0}")]
    Io(#[from] std::io::Error),
}

/// Opaque face-analysis detector polled by [`EmotionSampler`].
pub trait FaceDetector: Send + Sync {
    fn camera(&self) -> CameraState;

    /// Whether the expression models have finished loading.
    fn is_loaded(&self) -> bool;

    /// Whether a frame can be read right now (video playing, not ended).
    fn source_ready(&self) -> bool {
        self.camera() == CameraState::Granted
    }

    fn detect(&self) -> BoxFuture<'_, Result<Option<EmotionSnapshot>, EmotionError>>;
}
