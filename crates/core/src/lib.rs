//! Mock interview coaching: question turns, answer capture, and scored feedback.

pub mod asr;
pub mod config;
pub mod decode;
pub mod emotion;
pub mod feedback;
pub mod genai;
pub mod playback;
pub mod question;
pub mod session;
pub mod store;
pub mod tts;
pub mod util;
