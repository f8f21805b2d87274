use crate::error::ModelError;
use crate::model::ChatModel;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI Chat Completion request
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_completion_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

/// Check if a model is a reasoning model that doesn't support temperature
fn is_reasoning_model(model: &str) -> bool {
    model.starts_with("gpt-5")
        || model.starts_with("o1")
        || model.starts_with("o3")
        || model.starts_with("o4")
}

/// Client for an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    temperature: f32,
    max_completion_tokens: u32,
}

impl OpenAiClient {
    pub fn new(http: reqwest::Client, api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_url: api_url.into(),
            api_key: api_key.into(),
            temperature: 0.2,
            max_completion_tokens: 4096,
        }
    }

    /// Lower values give more literal, consistent translations
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn build_request(&self, model: &str, system: &str, user: &str) -> ChatRequest {
        // Reasoning models need higher token limits and don't support temperature
        let is_reasoning = is_reasoning_model(model);

        ChatRequest {
            model: model.to_string(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            max_completion_tokens: if is_reasoning {
                16000
            } else {
                self.max_completion_tokens
            },
            temperature: if is_reasoning {
                None
            } else {
                Some(self.temperature)
            },
            reasoning_effort: is_reasoning.then(|| "low".to_string()),
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(&self, model: &str, system: &str, user: &str) -> Result<String, ModelError> {
        let request = self.build_request(model, system, user);

        let response = self
            .http
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
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

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Malformed(format!("unparsable OpenAI response: {}", e)))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(ModelError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{body_partial_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn create_openai_response(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "choices": [
                {
                    "index": 0,
                    "message": {
                        "role": "assistant",
                        "content": content
                    },
                    "finish_reason": "stop"
                }
            ]
        })
    }

    fn client_for(server: &MockServer) -> OpenAiClient {
        OpenAiClient::new(
            reqwest::Client::new(),
            format!("{}/v1/chat/completions", server.uri()),
            "test-openai-key",
        )
    }

    // ==================== Request Structure Tests ====================

    #[test]
    fn test_request_serialization_standard_model() {
        let client = OpenAiClient::new(reqwest::Client::new(), DEFAULT_API_URL, "key")
            .with_temperature(0.3);
        let request = client.build_request("gpt-4o-mini", "Translate.", "[\"Hello\"]");

        let json = serde_json::to_string(&request).expect("Should serialize");
        assert!(json.contains("gpt-4o-mini"));
        assert!(json.contains("0.3"));
        assert!(json.contains("max_completion_tokens"));
        assert!(json.contains("system"));
        assert!(json.contains("user"));
        assert!(!json.contains("reasoning_effort"));
    }

    #[test]
    fn test_request_serialization_reasoning_model() {
        let client = OpenAiClient::new(reqwest::Client::new(), DEFAULT_API_URL, "key");
        let request = client.build_request("gpt-5-mini", "Translate.", "[]");

        let json = serde_json::to_string(&request).expect("Should serialize");
        assert!(json.contains("16000"));
        assert!(json.contains("\"reasoning_effort\":\"low\""));
        assert!(!json.contains("temperature"));
    }

    #[test]
    fn test_is_reasoning_model() {
        assert!(is_reasoning_model("gpt-5-mini"));
        assert!(is_reasoning_model("gpt-5"));
        assert!(is_reasoning_model("o1-mini"));
        assert!(is_reasoning_model("o3"));
        assert!(is_reasoning_model("o4-mini"));
        assert!(!is_reasoning_model("gpt-4o-mini"));
        assert!(!is_reasoning_model("gpt-4o"));
    }

    #[test]
    fn test_chat_response_deserialization() {
        let json = r#"{"choices": [{"message": {"role": "assistant", "content": "[\"Hola\"]"}}]}"#;
        let response: ChatResponse = serde_json::from_str(json).expect("Should deserialize");
        assert_eq!(response.choices[0].message.content, "[\"Hola\"]");
    }

    // ==================== Transport Tests ====================

    #[tokio::test]
    async fn test_complete_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test-openai-key"))
            .and(body_partial_json(serde_json::json!({"model": "gpt-4o-mini"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(create_openai_response("[\"Hola\"]")),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = client_for(&mock_server)
            .complete("gpt-4o-mini", "system", "user")
            .await
            .expect("Should succeed");

        assert_eq!(result, "[\"Hola\"]");
    }

    #[tokio::test]
    async fn test_complete_api_error_carries_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Rate limit exceeded"))
            .mount(&mock_server)
            .await;

        let err = client_for(&mock_server)
            .complete("gpt-4o-mini", "system", "user")
            .await
            .unwrap_err();

        match err {
            ModelError::Api { status, body } => {
                assert_eq!(status, 429);
                assert!(body.contains("Rate limit"));
            }
            other => panic!("expected API error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_complete_empty_choices() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&mock_server)
            .await;

        let err = client_for(&mock_server)
            .complete("gpt-4o-mini", "system", "user")
            .await
            .unwrap_err();

        assert!(matches!(err, ModelError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_complete_unparsable_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&mock_server)
            .await;

        let err = client_for(&mock_server)
            .complete("gpt-4o-mini", "system", "user")
            .await
            .unwrap_err();

        assert!(matches!(err, ModelError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_complete_connection_refused_is_transport_error() {
        let client = OpenAiClient::new(reqwest::Client::new(), "http://127.0.0.1:1/v1", "key");
        let err = client.complete("gpt-4o-mini", "s", "u").await.unwrap_err();
        assert!(matches!(err, ModelError::Transport(_)));
        assert!(err.is_retryable());
    }
}
