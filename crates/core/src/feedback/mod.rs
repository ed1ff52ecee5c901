//! Turns a finished session log into scores and written feedback.

mod gemini;
mod prompt;
mod summary;

use crate::config::InterviewType;
use crate::session::{SessionLog, SessionReport};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use gemini::GeminiEvaluator;
pub use prompt::{criteria_for, evaluation_prompt, EVALUATOR_SYSTEM_INSTRUCTION};
pub use summary::{
    describe_emotions, emotion_distribution, emotion_means, material_emotions, NO_EXPRESSION_DATA,
};

const LOG_TARGET: &str = "feedback";

pub const MIN_SCORE: f32 = 1.0;
pub const MAX_SCORE: f32 = 10.0;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackScores {
    pub clarity: f32,
    pub confidence: f32,
    pub answer_quality: f32,
    pub engagement: f32,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
    pub overall_feedback: String,
}

impl FeedbackScores {
    /// What the user sees when evaluation fails. Scores of zero mark it as not a real rating.
    pub fn fallback() -> Self {
        Self {
            clarity: 0.0,
            confidence: 0.0,
            answer_quality: 0.0,
            engagement: 0.0,
            strengths: vec!["Error during evaluation.".to_owned()],
            areas_for_improvement: vec![
                "Could not generate feedback due to an API error.".to_owned(),
            ],
            overall_feedback: "An error occurred while analyzing the interview. Please try again."
                .to_owned(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        *self == Self::fallback()
    }

    /// Pulls every score into `[1, 10]`. Non-finite scores are rejected.
    pub fn clamped(mut self) -> Result<Self, FeedbackError> {
        for score in [
            &mut self.clarity,
            &mut self.confidence,
            &mut self.answer_quality,
            &mut self.engagement,
        ] {
            if !score.is_finite() {
                return Err(FeedbackError::Malformed(format!("non-finite score {score}")));
            }
            *score = score.clamp(MIN_SCORE, MAX_SCORE);
        }
        Ok(self)
    }

    pub fn overall_score(&self) -> f32 {
        (self.clarity + self.confidence + self.answer_quality + self.engagement) / 4.0
    }
}

/// One turn as the evaluation service sees it.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnSummary {
    pub question: String,
    pub answer: String,
    pub non_verbal: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EvaluationRequest {
    pub interview_type: InterviewType,
    pub context: Option<String>,
    pub criteria: String,
    pub turns: Vec<TurnSummary>,
}

#[derive(thiserror::Error, Debug)]
pub enum FeedbackError {
    #[error(transparent)]
    GenAi(#[from] crate::genai::GenAiError),

    #[error("malformed evaluation: {0}")]
    Malformed(String),
}

pub trait Evaluator: Send + Sync {
    fn evaluate(&self, request: EvaluationRequest)
        -> BoxFuture<'_, Result<FeedbackScores, FeedbackError>>;
}

impl<T: Evaluator + ?Sized> Evaluator for Arc<T> {
    fn evaluate(
        &self,
        request: EvaluationRequest,
    ) -> BoxFuture<'_, Result<FeedbackScores, FeedbackError>> {
        (**self).evaluate(request)
    }
}

/// Summarizes expressions per turn, asks the evaluator, and falls back on any failure.
pub struct FeedbackAggregator<E> {
    evaluator: E,
    materiality_threshold: f32,
}

impl<E: Evaluator> FeedbackAggregator<E> {
    pub fn new(evaluator: E, materiality_threshold: f32) -> Self {
        Self {
            evaluator,
            materiality_threshold,
        }
    }

    pub fn request_for(
        &self,
        interview_type: InterviewType,
        log: &SessionLog,
        context: Option<&str>,
    ) -> EvaluationRequest {
        EvaluationRequest {
            interview_type,
            context: context
                .filter(|_| interview_type.takes_context())
                .map(str::to_owned),
            criteria: criteria_for(interview_type).to_owned(),
            turns: log
                .turns()
                .iter()
                .map(|t| TurnSummary {
                    question: t.question.clone(),
                    answer: t.answer.clone(),
                    non_verbal: describe_emotions(&t.emotion_data, self.materiality_threshold),
                })
                .collect(),
        }
    }

    /// Never fails: evaluator errors yield [`FeedbackScores::fallback`].
    pub async fn evaluate(
        &self,
        interview_type: InterviewType,
        log: &SessionLog,
        context: Option<&str>,
    ) -> FeedbackScores {
        let request = self.request_for(interview_type, log, context);
        match self.evaluator.evaluate(request).await.and_then(FeedbackScores::clamped) {
            Ok(scores) => scores,
            Err(e) => {
                tracing::error!(target: LOG_TARGET, error = %e, "evaluation failed; using fallback feedback");
                FeedbackScores::fallback()
            }
        }
    }

    /// `None` for an empty log: there is nothing to evaluate or keep.
    pub async fn report(
        &self,
        interview_type: InterviewType,
        log: SessionLog,
        context: Option<&str>,
    ) -> Option<SessionReport> {
        if log.is_empty() {
            return None;
        }
        let feedback = self.evaluate(interview_type, &log, context).await;
        Some(SessionReport::new(interview_type, log, feedback))
    }
}
