mod sequencer;

use crate::config::InterviewType;
use crate::emotion::EmotionSnapshot;
use crate::feedback::FeedbackScores;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use sequencer::{
    AdvanceCause, Collaborators, SequencerError, SessionCommand, SessionOutcome, SessionStatus,
    TurnSequencer, NO_ANSWER_PLACEHOLDER, TIME_UP_SUFFIX,
};

/// One question, the answer given, and the expressions sampled while answering.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub emotion_data: Vec<EmotionSnapshot>,
}

impl Turn {
    pub fn new<Q: Into<String>, A: Into<String>>(
        question: Q,
        answer: A,
        emotion_data: Vec<EmotionSnapshot>,
    ) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            emotion_data,
        }
    }
}

/// Append-only record of the turns of one session, in the order questions were asked.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct SessionLog(Vec<Turn>);

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.0.push(turn);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.0
    }

    /// The last `n` turns, oldest first.
    pub fn trailing(&self, n: usize) -> &[Turn] {
        &self.0[self.0.len().saturating_sub(n)..]
    }
}

impl From<Vec<Turn>> for SessionLog {
    fn from(turns: Vec<Turn>) -> Self {
        Self(turns)
    }
}

/// The finished result of a session.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub interview_type: InterviewType,
    pub log: SessionLog,
    pub feedback: FeedbackScores,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl SessionReport {
    pub fn new(interview_type: InterviewType, log: SessionLog, feedback: FeedbackScores) -> Self {
        Self {
            id: None,
            interview_type,
            log,
            feedback,
            created_at: None,
        }
    }

    pub fn persisted(self, id: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Some(id),
            created_at: Some(created_at),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_of(n: usize) -> SessionLog {
        (0..n)
            .map(|i| Turn::new(format!("q{i}"), format!("a{i}"), Vec::new()))
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn trailing_window_keeps_most_recent_turns_in_order() {
        let log = log_of(5);
        let window: Vec<_> = log.trailing(3).iter().map(|t| t.question.as_str()).collect();
        assert_eq!(window, ["q2", "q3", "q4"]);
        assert_eq!(log_of(2).trailing(3).len(), 2);
        assert!(SessionLog::new().trailing(3).is_empty());
    }

    #[test]
    fn report_serializes_with_document_field_names() {
        let report = SessionReport::new(InterviewType::School, log_of(1), FeedbackScores::fallback());
        let v = serde_json::to_value(&report).expect("serialize");
        assert_eq!(v["interviewType"], "School");
        assert_eq!(v["log"][0]["emotionData"], serde_json::json!([]));
        assert_eq!(v["feedback"]["answerQuality"], 0.0);
        assert!(v.get("id").is_none());
        assert!(v.get("createdAt").is_none());
    }

    #[test]
    fn turn_without_emotion_data_deserializes_to_empty_series() {
        let t: Turn = serde_json::from_str(r#"{"question":"q","answer":"a"}"#).expect("turn");
        assert!(t.emotion_data.is_empty());
    }
}
