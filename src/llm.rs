use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{ClankerError, Result};

/// Synchronous request/response LLM seam (spec §9: "a simple `Ask(prompt) ->
/// (text, err)`"). Cancellation is via the caller's deadline only; there is
/// no streaming and no callback surface.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn ask(&self, prompt: &str) -> Result<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(serde::Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(serde::Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(serde::Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// HTTP-backed client speaking a minimal chat-completion-shaped protocol.
pub struct HttpLlmClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpLlmClient {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            api_key,
        }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn ask(&self, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage { role: "user", content: prompt }],
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| ClankerError::Llm(err.to_string()))?;

        if !response.status().is_success() {
            return Err(ClankerError::Llm(format!(
                "llm endpoint returned {}",
                response.status()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|err| ClankerError::Llm(format!("malformed llm response: {err}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ClankerError::Llm("llm response had no choices".into()))
    }
}

/// Deterministic client used throughout the test suite: a queue of canned
/// responses consumed in call order, so planner/validator/repair loops can
/// be exercised without a live network call.
pub struct MockLlmClient {
    responses: Mutex<VecDeque<String>>,
}

impl MockLlmClient {
    pub fn new(responses: impl IntoIterator<Item = String>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn ask(&self, _prompt: &str) -> Result<String> {
        self.responses
            .lock()
            .expect("mock llm lock poisoned")
            .pop_front()
            .ok_or_else(|| ClankerError::Llm("mock llm client exhausted its responses".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_client_returns_responses_in_order() {
        let client = MockLlmClient::new(["first".to_string(), "second".to_string()]);
        assert_eq!(client.ask("a").await.unwrap(), "first");
        assert_eq!(client.ask("b").await.unwrap(), "second");
    }

    #[tokio::test]
    async fn mock_client_errors_when_exhausted() {
        let client = MockLlmClient::new(Vec::<String>::new());
        assert!(client.ask("a").await.is_err());
    }
}
