//! Gemini `generateContent` client, used as the default review judge.

use crate::error::ModelError;
use crate::model::ChatModel;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Serialize)]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    async fn complete(&self, model: &str, system: &str, user: &str) -> Result<String, ModelError> {
        let request = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: system.to_string(),
                }],
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: user.to_string(),
                }],
            }],
        };

        let response = self
            .http
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(ModelError::Api { status, body });
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Malformed(format!("unparsable Gemini response: {}", e)))?;

        let text = generated
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ModelError::EmptyResponse);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{body_partial_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn gemini_response(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": text}]}, "finishReason": "STOP"}
            ]
        })
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = GeminiClient::new(reqwest::Client::new(), "https://example.com/v1beta/", "k");
        assert_eq!(
            client.endpoint("gemini-2.5-pro"),
            "https://example.com/v1beta/models/gemini-2.5-pro:generateContent"
        );
    }

    #[tokio::test]
    async fn test_complete_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-pro:generateContent"))
            .and(header("x-goog-api-key", "test-gemini-key"))
            .and(body_partial_json(serde_json::json!({
                "system_instruction": {"parts": [{"text": "judge"}]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_response("{\"ok\": true}")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = GeminiClient::new(reqwest::Client::new(), mock_server.uri(), "test-gemini-key");
        let text = client
            .complete("gemini-2.5-pro", "judge", "pair")
            .await
            .expect("Should succeed");

        assert_eq!(text, "{\"ok\": true}");
    }

    #[tokio::test]
    async fn test_complete_service_unavailable() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&mock_server)
            .await;

        let client = GeminiClient::new(reqwest::Client::new(), mock_server.uri(), "key");
        let err = client.complete("gemini-2.5-pro", "s", "u").await.unwrap_err();

        assert!(matches!(err, ModelError::Api { status: 503, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_complete_no_candidates() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&mock_server)
            .await;

        let client = GeminiClient::new(reqwest::Client::new(), mock_server.uri(), "key");
        let err = client.complete("gemini-2.5-pro", "s", "u").await.unwrap_err();

        assert!(matches!(err, ModelError::EmptyResponse));
    }
}
