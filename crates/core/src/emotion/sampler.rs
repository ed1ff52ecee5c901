use crate::config::PollInterval;
use crate::emotion::{EmotionSnapshot, FaceDetector};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const LOG_TARGET: &str = "emotion::sampler";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    SourceNotReady,
    Detected,
    NoFace,
    Failed,
}

struct SamplerShared {
    history: Mutex<Vec<EmotionSnapshot>>,
    live: watch::Sender<EmotionSnapshot>,
}

impl SamplerShared {
    fn history(&self) -> std::sync::MutexGuard<'_, Vec<EmotionSnapshot>> {
        match self.history.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Polls a [`FaceDetector`] on a fixed cadence and buffers the snapshots of one answer.
///
/// Only successful detections reach the history. A tick without a face publishes the
/// neutral snapshot to the live display and nothing else.
pub struct EmotionSampler<D: ?Sized> {
    detector: Arc<D>,
    interval: Duration,
    shared: Arc<SamplerShared>,
    task: Option<JoinHandle<()>>,
}

impl<D> EmotionSampler<D>
where
    D: FaceDetector + ?Sized + 'static,
{
    pub fn new(detector: Arc<D>, interval: PollInterval) -> Self {
        let (live, _) = watch::channel(EmotionSnapshot::NEUTRAL);
        Self {
            detector,
            interval: interval.get(),
            shared: Arc::new(SamplerShared {
                history: Mutex::new(Vec::new()),
                live,
            }),
            task: None,
        }
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn live(&self) -> watch::Receiver<EmotionSnapshot> {
        self.shared.live.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Clears the history and starts polling. A loop that is already running is
    /// stopped first, so at most one poll loop exists.
    pub fn start(&mut self) {
        self.stop();
        self.shared.history().clear();

        let detector = Arc::clone(&self.detector);
        let shared = Arc::clone(&self.shared);
        let interval = self.interval;
        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick of a tokio interval completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                poll_once(detector.as_ref(), &shared).await;
            }
        }));
        tracing::debug!(target: LOG_TARGET, interval_ms = self.interval.as_millis() as u64, "sampling started");
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!(target: LOG_TARGET, "sampling stopped");
        }
    }

    /// Runs a single poll outside the loop.
    pub async fn tick(&self) -> TickOutcome {
        poll_once(self.detector.as_ref(), &self.shared).await
    }

    /// Takes the snapshots gathered since the last `start`, leaving the buffer empty.
    pub fn drain_history(&self) -> Vec<EmotionSnapshot> {
        std::mem::take(&mut *self.shared.history())
    }
}

impl<D: ?Sized> Drop for EmotionSampler<D> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn poll_once<D: FaceDetector + ?Sized>(detector: &D, shared: &SamplerShared) -> TickOutcome {
    if !detector.source_ready() {
        return TickOutcome::SourceNotReady;
    }

    match detector.detect().await {
        Ok(Some(snapshot)) => {
            let snapshot = snapshot.normalized();
            shared.live.send_replace(snapshot);
            shared.history().push(snapshot);
            TickOutcome::Detected
        }
        Ok(None) => {
            shared.live.send_replace(EmotionSnapshot::NEUTRAL);
            TickOutcome::NoFace
        }
        Err(e) => {
            tracing::warn!(target: LOG_TARGET, error = %e, "face detection tick failed");
            TickOutcome::Failed
        }
    }
}
