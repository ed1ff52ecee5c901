use crate::config::{ApiKey, GeminiConfig, DEFAULT_GEMINI_BASE_URL};
use crate::genai::{GenAiError, GenerateContentRequest, GenerateContentResponse};
use crate::util::{retry_with_backoff, RetryConfig};
use reqwest::Client;
use std::time::Duration;

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: ApiKey,
    base_url: String,
    retry: RetryConfig,
}

impl GeminiClient {
    pub fn new(api_key: ApiKey) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "falling back to default http client");
                Client::new()
            });
        Self {
            client,
            api_key,
            base_url: DEFAULT_GEMINI_BASE_URL.to_owned(),
            retry: RetryConfig::default(),
        }
    }

    pub fn from_config(cfg: &GeminiConfig) -> Self {
        Self::new(cfg.api_key.clone()).with_base_url(cfg.base_url.clone())
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_owned();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GenAiError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        retry_with_backoff(
            &self.retry,
            || self.send_once(&url, request),
            GenAiError::is_retryable,
        )
        .await
    }

    async fn send_once(
        &self,
        url: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GenAiError> {
        tracing::debug!(url, "sending generateContent request");
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", self.api_key.expose())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_owned());
            return Err(GenAiError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| GenAiError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> GeminiClient {
        GeminiClient::new(ApiKey::new("test-key").expect("key"))
            .with_base_url(format!("{}/", server.uri()))
            .with_retry(RetryConfig::new(2, Duration::from_millis(1)))
    }

    #[tokio::test]
    async fn posts_to_model_endpoint_with_key_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-pro:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(json!({"contents": [{"parts": [{"text": "hello"}]}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "Hi there"}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resp = client_for(&server)
            .generate_content("gemini-2.5-pro", &GenerateContentRequest::from_prompt("hello"))
            .await
            .expect("ok");
        assert_eq!(resp.text().as_deref(), Some("Hi there"));
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate_content("m", &GenerateContentRequest::from_prompt("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, GenAiError::Api { status: 400, ref body } if body == "bad request"));
    }

    #[tokio::test]
    async fn server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate_content("m", &GenerateContentRequest::from_prompt("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, GenAiError::Api { status: 503, .. }));
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate_content("m", &GenerateContentRequest::from_prompt("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, GenAiError::InvalidResponse(_)));
    }
}
