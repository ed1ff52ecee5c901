mod gemini;
mod prompt;

use crate::config::{InterviewType, InterviewerSettings};
use crate::session::Turn;
use futures::future::BoxFuture;

pub use gemini::GeminiQuestionGenerator;
pub use prompt::{question_prompt, system_instruction};

/// Asked when the question service fails, so the session can carry on.
pub const FALLBACK_QUESTION: &str =
    "I'm sorry, I encountered an issue. Let's try that again. Can you tell me about yourself?";

#[derive(Clone, Debug, PartialEq)]
pub struct QuestionRequest {
    pub interview_type: InterviewType,
    /// Trailing window of the most recent turns, oldest first.
    pub history: Vec<Turn>,
    pub context: Option<String>,
    pub settings: InterviewerSettings,
}

#[derive(thiserror::Error, Debug)]
pub enum QuestionError {
    #[error(transparent)]
    GenAi(#[from] crate::genai::GenAiError),

    #[error("question service returned an empty question")]
    Empty,
}

pub trait QuestionGenerator: Send + Sync {
    fn next_question(&self, request: QuestionRequest)
        -> BoxFuture<'_, Result<String, QuestionError>>;
}
