use crate::playback::{PlaybackError, PlaybackSink};
use crate::tts::TtsAudio;
use futures::future::BoxFuture;
use futures::FutureExt;
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::source::Source;
use rodio::{OutputStream, OutputStreamBuilder, Sink};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const LOG_TARGET: &str = "playback::audio";

/// Interviewer voice output on a local audio device.
///
/// One [`OutputStream`] is opened lazily and shared by all clones; dropping it would cut
/// off whatever is still playing.
#[derive(Clone)]
pub struct AudioPlaybackSink {
    output_device_name: Option<String>,
    stream: Arc<Mutex<Option<OutputStream>>>,
    disabled: Arc<AtomicBool>,
    last_blank_warning: Arc<Mutex<Option<Instant>>>,
}

impl AudioPlaybackSink {
    pub fn new() -> Self {
        Self {
            output_device_name: None,
            stream: Arc::new(Mutex::new(None)),
            disabled: Arc::new(AtomicBool::new(false)),
            last_blank_warning: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_output_device_name<S: Into<String>>(mut self, name: S) -> Self {
        self.output_device_name = Some(name.into());
        self
    }

    fn connect_sink(&self) -> Result<Sink, PlaybackError> {
        let mut guard = match self.stream.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!(target: LOG_TARGET, "output stream lock was poisoned; recovering");
                poisoned.into_inner()
            }
        };
        if guard.is_none() {
            *guard = Some(self.open_output_stream()?);
        }
        match guard.as_ref() {
            Some(stream) => Ok(Sink::connect_new(stream.mixer())),
            None => Err(PlaybackError::AudioOutputUnavailable {
                details: "output stream missing after open".to_owned(),
            }),
        }
    }

    fn open_output_stream(&self) -> Result<OutputStream, PlaybackError> {
        if let Some(wanted) = self.output_device_name.as_deref() {
            match open_named_output_stream(wanted) {
                Ok(stream) => return Ok(stream),
                Err(details) => tracing::warn!(
                    target: LOG_TARGET,
                    wanted_device = %wanted,
                    %details,
                    "configured output device unusable; using default device"
                ),
            }
        }
        OutputStreamBuilder::open_default_stream().map_err(|e| {
            PlaybackError::AudioOutputUnavailable {
                details: format!("open default output stream: {e}"),
            }
        })
    }

    fn should_warn_blank(&self) -> bool {
        let mut last = match self.last_blank_warning.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        rate_limit(&mut last, Instant::now(), Duration::from_secs(5))
    }
}

impl Default for AudioPlaybackSink {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackSink for AudioPlaybackSink {
    fn play(&self, audio: TtsAudio) -> BoxFuture<'_, Result<(), PlaybackError>> {
        async move {
            if self.disabled.load(Ordering::Relaxed) {
                return Ok(());
            }

            if !is_playable(&audio) {
                if self.should_warn_blank() {
                    tracing::warn!(
                        target: LOG_TARGET,
                        sample_rate_hz = audio.sample_rate_hz,
                        channels = audio.channels,
                        samples = audio.pcm_i16.len(),
                        "skipping empty or malformed speech audio"
                    );
                }
                return Ok(());
            }

            let sink = match self.connect_sink() {
                Ok(sink) => sink,
                Err(e) => {
                    // No device at all will not get better during this process.
                    if matches!(&e, PlaybackError::AudioOutputUnavailable { details } if details.contains("NoDevice"))
                    {
                        self.disabled.store(true, Ordering::Relaxed);
                    }
                    return Err(e);
                }
            };

            sink.append(PcmSource::new(audio));
            tokio::task::spawn_blocking(move || sink.sleep_until_end())
                .await
                .map_err(|e| PlaybackError::Task(e.to_string()))
        }
        .boxed()
    }
}

fn is_playable(audio: &TtsAudio) -> bool {
    audio.sample_rate_hz > 0
        && audio.channels > 0
        && !audio.is_empty()
        && audio.pcm_i16.len() % usize::from(audio.channels) == 0
}

fn rate_limit(last: &mut Option<Instant>, now: Instant, interval: Duration) -> bool {
    match *last {
        Some(prev) if now.duration_since(prev) < interval => false,
        _ => {
            *last = Some(now);
            true
        }
    }
}

fn open_named_output_stream(wanted: &str) -> Result<OutputStream, String> {
    let wanted_norm = wanted.trim().to_ascii_lowercase();
    let host = rodio::cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| format!("failed to list output devices: {e}"))?;

    let mut available = Vec::new();
    for device in devices {
        let name = device.name().unwrap_or_else(|_| "<unnamed>".to_owned());
        if name.trim().to_ascii_lowercase() == wanted_norm {
            return OutputStreamBuilder::from_device(device)
                .and_then(|b| b.open_stream_or_fallback())
                .map_err(|e| format!("failed to open {name}: {e}"));
        }
        available.push(name);
    }
    Err(format!("not found; available: {}", available.join(", ")))
}

struct PcmSource {
    samples: std::vec::IntoIter<i16>,
    sample_rate: u32,
    channels: u16,
}

impl PcmSource {
    fn new(audio: TtsAudio) -> Self {
        Self {
            samples: audio.pcm_i16.into_iter(),
            sample_rate: audio.sample_rate_hz,
            channels: audio.channels,
        }
    }
}

impl Iterator for PcmSource {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        self.samples.next().map(|s| f32::from(s) / 32768.0)
    }
}

impl Source for PcmSource {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio(channels: u16, samples: usize) -> TtsAudio {
        TtsAudio {
            sample_rate_hz: 24_000,
            channels,
            pcm_i16: vec![0; samples],
        }
    }

    #[test]
    fn blank_or_ragged_audio_is_not_playable() {
        assert!(is_playable(&audio(1, 10)));
        assert!(!is_playable(&audio(1, 0)));
        assert!(!is_playable(&audio(2, 3)));
        assert!(!is_playable(&audio(0, 4)));
    }

    #[test]
    fn blank_audio_warning_is_rate_limited() {
        let mut last = None;
        let t0 = Instant::now();
        assert!(rate_limit(&mut last, t0, Duration::from_secs(5)));
        assert!(!rate_limit(&mut last, t0 + Duration::from_secs(1), Duration::from_secs(5)));
        assert!(rate_limit(&mut last, t0 + Duration::from_secs(6), Duration::from_secs(5)));
    }

    #[test]
    fn pcm_source_scales_samples() {
        let mut src = PcmSource::new(TtsAudio {
            sample_rate_hz: 24_000,
            channels: 1,
            pcm_i16: vec![i16::MIN, 0, 16384],
        });
        assert_eq!(src.next(), Some(-1.0));
        assert_eq!(src.next(), Some(0.0));
        assert_eq!(src.next(), Some(0.5));
        assert_eq!(src.next(), None);
    }
}
