use crate::feedback::{
    evaluation_prompt, EvaluationRequest, Evaluator, FeedbackError, FeedbackScores,
    EVALUATOR_SYSTEM_INSTRUCTION,
};
use crate::genai::{GeminiClient, GenAiError, GenerateContentRequest, GenerationConfig};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::json;

#[derive(Clone)]
pub struct GeminiEvaluator {
    client: GeminiClient,
    model: String,
}

impl GeminiEvaluator {
    pub fn new<S: Into<String>>(client: GeminiClient, model: S) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

fn response_schema() -> serde_json::Value {
    let score = |what: &str| {
        json!({"type": "NUMBER", "description": format!("Score from 1-10 for {what}.")})
    };
    let list = |what: &str| {
        json!({"type": "ARRAY", "items": {"type": "STRING"}, "description": what})
    };
    json!({
        "type": "OBJECT",
        "properties": {
            "clarity": score("clarity of speech and thought"),
            "confidence": score("confidence, considering both words and facial expressions"),
            "answerQuality": score("the quality and relevance of answers"),
            "engagement": score("engagement, considering both words and facial expressions"),
            "strengths": list("Key strengths, including non-verbal cues."),
            "areasForImprovement": list("Areas for improvement, including non-verbal cues."),
            "overallFeedback": {
                "type": "STRING",
                "description": "A summary paragraph of overall performance."
            }
        },
        "required": [
            "clarity", "confidence", "answerQuality", "engagement",
            "strengths", "areasForImprovement", "overallFeedback"
        ]
    })
}

/// Models occasionally wrap JSON in a markdown fence even when asked not to.
fn strip_code_fence(text: &str) -> &str {
    let t = text.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

impl Evaluator for GeminiEvaluator {
    fn evaluate(
        &self,
        request: EvaluationRequest,
    ) -> BoxFuture<'_, Result<FeedbackScores, FeedbackError>> {
        async move {
            let body = GenerateContentRequest::from_prompt(evaluation_prompt(&request))
                .with_system_instruction(EVALUATOR_SYSTEM_INSTRUCTION)
                .with_generation_config(GenerationConfig {
                    response_mime_type: Some("application/json".to_owned()),
                    response_schema: Some(response_schema()),
                    ..Default::default()
                });

            let response = self.client.generate_content(&self.model, &body).await?;
            let text = response.text().ok_or(GenAiError::EmptyResponse)?;
            serde_json::from_str(strip_code_fence(&text))
                .map_err(|e| FeedbackError::Malformed(e.to_string()))
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiKey, InterviewType};
    use crate::util::RetryConfig;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn evaluator(server: &MockServer) -> GeminiEvaluator {
        let client = GeminiClient::new(ApiKey::new("k").expect("key"))
            .with_base_url(server.uri())
            .with_retry(RetryConfig::none());
        GeminiEvaluator::new(client, "gemini-2.5-pro")
    }

    fn request() -> EvaluationRequest {
        EvaluationRequest {
            interview_type: InterviewType::School,
            context: None,
            criteria: "be curious".to_owned(),
            turns: Vec::new(),
        }
    }

    fn reply(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": text}]}}]
        }))
    }

    #[tokio::test]
    async fn parses_structured_feedback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-pro:generateContent"))
            .and(body_partial_json(json!({
                "generationConfig": {
                    "responseMimeType": "application/json",
                    "responseSchema": {"type": "OBJECT"}
                }
            })))
            .respond_with(reply(
                r#"{"clarity":8,"confidence":7.5,"answerQuality":6,"engagement":9,
                    "strengths":["calm"],"areasForImprovement":["detail"],
                    "overallFeedback":"Solid."}"#,
            ))
            .mount(&server)
            .await;

        let scores = evaluator(&server).evaluate(request()).await.expect("scores");
        assert_eq!(scores.confidence, 7.5);
        assert_eq!(scores.strengths, ["calm"]);
        assert_eq!(scores.overall_feedback, "Solid.");
    }

    #[tokio::test]
    async fn missing_field_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(reply(r#"{"clarity":8}"#))
            .mount(&server)
            .await;

        let err = evaluator(&server).evaluate(request()).await.unwrap_err();
        assert!(matches!(err, FeedbackError::Malformed(_)));
    }

    #[test]
    fn fences_are_stripped() {
        assert_eq!(strip_code_fence("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fence(" {} "), "{}");
    }
}
