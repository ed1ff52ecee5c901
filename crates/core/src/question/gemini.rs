use crate::genai::{GeminiClient, GenerateContentRequest, GenerationConfig};
use crate::question::{
    question_prompt, system_instruction, QuestionError, QuestionGenerator, QuestionRequest,
};
use futures::future::BoxFuture;
use futures::FutureExt;

const QUESTION_TEMPERATURE: f32 = 0.8;

#[derive(Clone)]
pub struct GeminiQuestionGenerator {
    client: GeminiClient,
    model: String,
}

impl GeminiQuestionGenerator {
    pub fn new<S: Into<String>>(client: GeminiClient, model: S) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

impl QuestionGenerator for GeminiQuestionGenerator {
    fn next_question(
        &self,
        request: QuestionRequest,
    ) -> BoxFuture<'_, Result<String, QuestionError>> {
        async move {
            let body = GenerateContentRequest::from_prompt(question_prompt(&request))
                .with_system_instruction(system_instruction(
                    request.interview_type,
                    request.settings.personality,
                ))
                .with_generation_config(GenerationConfig {
                    temperature: Some(QUESTION_TEMPERATURE),
                    ..Default::default()
                });

            let response = self.client.generate_content(&self.model, &body).await?;
            response.text().ok_or(QuestionError::Empty)
        }
        .boxed()
    }
}
