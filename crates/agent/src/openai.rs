//! Client for OpenAI-compatible `chat/completions` endpoints.

use std::time::Duration;

use async_trait::async_trait;
use cotizador_core::config::LlmConfig;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::llm::{CompletionRequest, LlmClient, LlmError};

const RETRY_BASE_DELAY_MS: u64 = 250;

pub struct OpenAiClient {
    http: Client,
    endpoint: String,
    api_key: SecretString,
    model: String,
    max_retries: u32,
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| LlmError::Client(error.to_string()))?;

        Ok(Self {
            http,
            endpoint: chat_endpoint(&config.base_url),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let body = chat_body(&self.model, request);
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        let payload = response.text().await?;
        first_choice_text(&payload)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let mut attempt = 0;
        loop {
            match self.send(request).await {
                Ok(text) => return Ok(text),
                Err(error) if error.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = Duration::from_millis(
                        RETRY_BASE_DELAY_MS.saturating_mul(2u64.saturating_pow(attempt - 1)),
                    );
                    warn!(
                        event_name = "llm.request.retry",
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "language model request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

fn chat_endpoint(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

fn chat_body<'a>(model: &'a str, request: &'a CompletionRequest) -> ChatCompletionBody<'a> {
    ChatCompletionBody {
        model,
        messages: [
            ChatMessage { role: "system", content: &request.system },
            ChatMessage { role: "user", content: &request.prompt },
        ],
        temperature: request.temperature,
        max_tokens: request.max_tokens,
    }
}

fn first_choice_text(payload: &str) -> Result<String, LlmError> {
    let response: ChatCompletionResponse =
        serde_json::from_str(payload).map_err(|error| LlmError::Decode(error.to_string()))?;
    let choice = response.choices.into_iter().next().ok_or(LlmError::EmptyChoices)?;
    let text = choice.message.content.unwrap_or_default();
    debug!(event_name = "llm.response.received", chars = text.len(), "language model replied");
    Ok(text)
}
