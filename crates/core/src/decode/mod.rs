//! Decoding of the base64 PCM payload returned by the speech model.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sample rate of Gemini speech output.
pub const TTS_SAMPLE_RATE_HZ: u32 = 24_000;
pub const TTS_CHANNELS: u16 = 1;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmFormat {
    pub const fn gemini_tts() -> Self {
        Self {
            sample_rate: TTS_SAMPLE_RATE_HZ,
            channels: TTS_CHANNELS,
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid base64 payload: {0}")]
    Base64(String),

    #[error("invalid pcm output: {0}")]
    InvalidPcm(String),
}

pub type Result<T> = std::result::Result<T, DecodeError>;

/// Decodes base64 text into signed 16-bit little-endian samples.
pub fn decode_base64_pcm(data: &str) -> Result<Vec<i16>> {
    let raw = STANDARD
        .decode(data.trim())
        .map_err(|e| DecodeError::Base64(e.to_string()))?;
    parse_s16le(&raw)
}

pub fn parse_s16le(raw: &[u8]) -> Result<Vec<i16>> {
    if raw.len() % 2 != 0 {
        return Err(DecodeError::InvalidPcm(format!(
            "s16le byte length must be even, got {}",
            raw.len()
        )));
    }
    Ok(raw
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

pub fn duration_of(format: PcmFormat, samples: usize) -> Duration {
    if format.sample_rate == 0 || format.channels == 0 {
        return Duration::from_secs(0);
    }
    let frames = samples as u128 / u128::from(format.channels);
    let micros = frames * 1_000_000u128 / u128::from(format.sample_rate);
    Duration::from_micros(micros.min(u128::from(u64::MAX)) as u64)
}
