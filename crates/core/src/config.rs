use serde::{Deserialize, Serialize};
use std::{fmt, path::Path, time::Duration};

pub const DEFAULT_TURN_LIMIT: u32 = 5;
pub const DEFAULT_ANSWER_SECS: u64 = 300;
pub const DEFAULT_HISTORY_WINDOW: usize = 3;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_MATERIALITY_THRESHOLD: f32 = 0.1;
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-pro";
pub const DEFAULT_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_FIREBASE_API_KEY: &str = "FIREBASE_API_KEY";
pub const ENV_FIREBASE_PROJECT_ID: &str = "FIREBASE_PROJECT_ID";
pub const ENV_FIREBASE_EMAIL: &str = "FIREBASE_EMAIL";
pub const ENV_FIREBASE_PASSWORD: &str = "FIREBASE_PASSWORD";

/// The kind of interview being practiced.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum InterviewType {
    #[default]
    Job,
    School,
    Casual,
}

impl InterviewType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Job => "Job",
            Self::School => "School",
            Self::Casual => "Casual",
        }
    }

    /// Only job interviews carry a role/company context.
    pub fn takes_context(&self) -> bool {
        matches!(self, Self::Job)
    }
}

impl fmt::Display for InterviewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InterviewType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "job" => Ok(Self::Job),
            "school" => Ok(Self::School),
            "casual" => Ok(Self::Casual),
            other => Err(ConfigError::UnknownInterviewType(other.to_owned())),
        }
    }
}

/// Prebuilt Gemini speech voices offered to the user.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum AiVoice {
    #[default]
    Kore,
    Puck,
    Charon,
    Fenrir,
    Zephyr,
}

impl AiVoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kore => "Kore",
            Self::Puck => "Puck",
            Self::Charon => "Charon",
            Self::Fenrir => "Fenrir",
            Self::Zephyr => "Zephyr",
        }
    }
}

impl std::str::FromStr for AiVoice {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kore" => Ok(Self::Kore),
            "puck" => Ok(Self::Puck),
            "charon" => Ok(Self::Charon),
            "fenrir" => Ok(Self::Fenrir),
            "zephyr" => Ok(Self::Zephyr),
            other => Err(ConfigError::UnknownVoice(other.to_owned())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum AiPersonality {
    Friendly,
    #[default]
    Professional,
    Strict,
}

impl AiPersonality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Friendly => "Friendly",
            Self::Professional => "Professional",
            Self::Strict => "Strict",
        }
    }
}

impl std::str::FromStr for AiPersonality {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "friendly" => Ok(Self::Friendly),
            "professional" => Ok(Self::Professional),
            "strict" => Ok(Self::Strict),
            other => Err(ConfigError::UnknownPersonality(other.to_owned())),
        }
    }
}

/// Voice and tone of the interviewer, persisted between runs.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InterviewerSettings {
    pub voice: AiVoice,
    pub personality: AiPersonality,
}

impl InterviewerSettings {
    /// Loads settings from a JSON file. A missing or unreadable file yields defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(settings) => settings,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "could not parse settings; using defaults");
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not read settings; using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
            }
        }
        let raw =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Io(e.to_string()))?;
        std::fs::write(path, raw).map_err(|e| ConfigError::Io(e.to_string()))
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new<S: Into<String>>(value: S) -> Result<Self, ConfigError> {
        let v = value.into();
        if v.trim().is_empty() {
            return Err(ConfigError::EmptyApiKey);
        }
        Ok(Self(v))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(**redacted**)")
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "u32", into = "u32")]
pub struct TurnLimit(u32);

impl TurnLimit {
    pub fn new(turns: u32) -> Result<Self, ConfigError> {
        if turns == 0 {
            return Err(ConfigError::ZeroTurns);
        }
        Ok(Self(turns))
    }

    pub fn get(&self) -> usize {
        self.0 as usize
    }
}

impl Default for TurnLimit {
    fn default() -> Self {
        Self(DEFAULT_TURN_LIMIT)
    }
}

impl TryFrom<u32> for TurnLimit {
    type Error = ConfigError;

    fn try_from(turns: u32) -> Result<Self, Self::Error> {
        Self::new(turns)
    }
}

impl From<TurnLimit> for u32 {
    fn from(limit: TurnLimit) -> Self {
        limit.0
    }
}

/// Countdown each answer gets before the sequencer moves on by itself.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "u64", into = "u64")]
pub struct AnswerTimeLimit(u64);

impl AnswerTimeLimit {
    pub fn new(secs: u64) -> Result<Self, ConfigError> {
        if secs == 0 {
            return Err(ConfigError::ZeroAnswerTime);
        }
        Ok(Self(secs))
    }

    pub fn secs(&self) -> u64 {
        self.0
    }
}

impl Default for AnswerTimeLimit {
    fn default() -> Self {
        Self(DEFAULT_ANSWER_SECS)
    }
}

impl TryFrom<u64> for AnswerTimeLimit {
    type Error = ConfigError;

    fn try_from(secs: u64) -> Result<Self, Self::Error> {
        Self::new(secs)
    }
}

impl From<AnswerTimeLimit> for u64 {
    fn from(limit: AnswerTimeLimit) -> Self {
        limit.0
    }
}

/// Cadence of face-expression sampling, serialized as whole milliseconds.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "u64", into = "u64")]
pub struct PollInterval(Duration);

impl PollInterval {
    pub fn new(interval: Duration) -> Result<Self, ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(Self(interval))
    }

    pub fn from_millis(ms: u64) -> Result<Self, ConfigError> {
        Self::new(Duration::from_millis(ms))
    }

    pub fn get(&self) -> Duration {
        self.0
    }
}

impl Default for PollInterval {
    fn default() -> Self {
        Self(Duration::from_millis(DEFAULT_POLL_INTERVAL_MS))
    }
}

impl TryFrom<u64> for PollInterval {
    type Error = ConfigError;

    fn try_from(ms: u64) -> Result<Self, Self::Error> {
        Self::from_millis(ms)
    }
}

impl From<PollInterval> for u64 {
    fn from(interval: PollInterval) -> Self {
        interval.0.as_millis().min(u128::from(u64::MAX)) as u64
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    pub turn_limit: TurnLimit,
    pub answer_time: AnswerTimeLimit,
    pub history_window: usize,
    pub poll_interval: PollInterval,
    pub materiality_threshold: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            turn_limit: TurnLimit::default(),
            answer_time: AnswerTimeLimit::default(),
            history_window: DEFAULT_HISTORY_WINDOW,
            poll_interval: PollInterval::default(),
            materiality_threshold: DEFAULT_MATERIALITY_THRESHOLD,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeminiConfig {
    pub api_key: ApiKey,
    pub base_url: String,
    pub text_model: String,
    pub tts_model: String,
}

impl GeminiConfig {
    pub fn new(api_key: ApiKey) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_GEMINI_BASE_URL.to_owned(),
            text_model: DEFAULT_TEXT_MODEL.to_owned(),
            tts_model: DEFAULT_TTS_MODEL.to_owned(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FirebaseConfig {
    pub api_key: ApiKey,
    pub project_id: String,
}

impl FirebaseConfig {
    pub fn new<S: Into<String>>(api_key: ApiKey, project_id: S) -> Result<Self, ConfigError> {
        let project_id = project_id.into();
        if project_id.trim().is_empty() {
            return Err(ConfigError::EmptyProjectId);
        }
        Ok(Self {
            api_key,
            project_id,
        })
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("api key must not be empty")]
    EmptyApiKey,
    #[error("firebase project id must not be empty")]
    EmptyProjectId,
    #[error("turn limit must be > 0")]
    ZeroTurns,
    #[error("answer time limit must be > 0 s")]
    ZeroAnswerTime,
    #[error("poll interval must be > 0 ms")]
    ZeroPollInterval,
    #[error("unknown interview type: {0}")]
    UnknownInterviewType(String),
    #[error("unknown voice: {0}")]
    UnknownVoice(String),
    #[error("unknown personality: {0}")]
    UnknownPersonality(String),
    #[error("settings io: {0}")]
    Io(String),
}

pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Clone, Debug, Default)]
pub struct StdEnv;

impl Env for StdEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MapEnv {
    vars: std::collections::BTreeMap<String, String>,
}

impl MapEnv {
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl Env for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn resolve_api_key(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
) -> Result<Option<ApiKey>, ConfigError> {
    match cli_value {
        Some(v) => Ok(Some(ApiKey::new(v)?)),
        None => match env.var(env_key) {
            Some(v) => Ok(Some(ApiKey::new(v)?)),
            None => Ok(None),
        },
    }
}

pub fn resolve_optional_string(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
) -> Option<String> {
    match cli_value {
        Some(v) => Some(v),
        None => env.var(env_key),
    }
}
