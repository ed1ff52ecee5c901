use crate::emotion::{CameraState, EmotionError, EmotionSnapshot, FaceDetector};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A granted camera that never finds a face. Every answer ends with an empty series.
#[derive(Clone, Debug, Default)]
pub struct NoFaceDetector;

impl NoFaceDetector {
    pub fn new() -> Self {
        Self
    }
}

impl FaceDetector for NoFaceDetector {
    fn camera(&self) -> CameraState {
        CameraState::Granted
    }

    fn is_loaded(&self) -> bool {
        true
    }

    fn detect(&self) -> BoxFuture<'_, Result<Option<EmotionSnapshot>, EmotionError>> {
        async { Ok(None) }.boxed()
    }
}

/// Replays a recorded expression trace, one entry per poll, wrapping at the end.
///
/// The trace is JSON lines: a snapshot object per line, or `null` for a frame without
/// a face. Blank lines are ignored.
#[derive(Debug)]
pub struct ReplayFaceDetector {
    frames: Vec<Option<EmotionSnapshot>>,
    cursor: AtomicUsize,
}

impl ReplayFaceDetector {
    pub fn from_path(path: &Path) -> Result<Self, EmotionError> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, EmotionError> {
        let mut frames = Vec::new();
        for (idx, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let frame: Option<EmotionSnapshot> =
                serde_json::from_str(line).map_err(|e| EmotionError::Trace {
                    line: idx + 1,
                    message: e.to_string(),
                })?;
            frames.push(frame.map(EmotionSnapshot::normalized));
        }
        tracing::debug!(frames = frames.len(), "emotion trace loaded");
        Ok(Self {
            frames,
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FaceDetector for ReplayFaceDetector {
    fn camera(&self) -> CameraState {
        CameraState::Granted
    }

    fn is_loaded(&self) -> bool {
        true
    }

    fn detect(&self) -> BoxFuture<'_, Result<Option<EmotionSnapshot>, EmotionError>> {
        let frame = if self.frames.is_empty() {
            None
        } else {
            let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.frames.len();
            self.frames[idx]
        };
        async move { Ok(frame) }.boxed()
    }
}
