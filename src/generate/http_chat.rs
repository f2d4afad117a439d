//! HTTP chat-completions client
//!
//! Both generation providers expose an OpenAI-compatible
//! `POST /v1/chat/completions`; only the base URL, model and credential
//! differ per provider.

use crate::error::{Error, Result};
use crate::providers::ProviderSpec;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

pub struct ChatClient {
    client: Client,
    base_url: Url,
    model: String,
    api_key: Option<String>,
}

impl ChatClient {
    pub fn new(base_url: &str, spec: &ProviderSpec) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        let model = spec
            .model
            .ok_or_else(|| Error::Config(format!("Provider {} declares no model", spec.id)))?
            .to_string();
        let client = Client::builder().timeout(spec.timeout).build()?;
        Ok(Self {
            client,
            base_url,
            model,
            api_key: spec.credential(),
        })
    }

    /// Run one chat completion and return the assistant's message text
    pub async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let url = self
            .base_url
            .join("/v1/chat/completions")
            .map_err(|e| Error::Config(format!("Invalid generation service URL: {}", e)))?;
        let body = ChatRequest {
            model: self.model.clone(),
            messages,
        };

        let mut request = self.client.post(url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Generation(e.to_string()))?;
        let response = response
            .error_for_status()
            .map_err(|e| Error::Generation(e.to_string()))?;
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Generation(format!("Malformed chat response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Generation("Chat response contained no choices".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{DocumentFormat, ProviderKind, Tier};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn spec() -> ProviderSpec {
        ProviderSpec {
            id: "ollama",
            kind: ProviderKind::Generation,
            tier: Tier::Free,
            supported_formats: &[DocumentFormat::PlainText],
            requires_credential: false,
            credential_env: None,
            cost_per_unit: 0.0,
            timeout: Duration::from_secs(5),
            model: Some("llama3.1"),
            dimension: None,
        }
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "hello there"}}]
            })))
            .mount(&server)
            .await;

        let client = ChatClient::new(&server.uri(), &spec()).unwrap();
        let text = client
            .complete(vec![ChatMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }])
            .await
            .unwrap();

        assert_eq!(text, "hello there");
    }

    #[tokio::test]
    async fn test_empty_choices_is_generation_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let client = ChatClient::new(&server.uri(), &spec()).unwrap();
        let err = client.complete(Vec::new()).await.unwrap_err();

        assert!(matches!(err, Error::Generation(_)));
    }
}
