use super::models::{GenerationParams, Usage};
use crate::config::EndpointConfig;
use crate::suggest::SuggestionError;
use crate::util::truncate;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Response from the completion endpoint including usage stats
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub usage: Option<Usage>,
    pub model: String,
}

/// A chat-style completion endpoint
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send one system + user exchange and return the first choice.
    async fn complete(
        &self,
        api_key: &str,
        system: &str,
        user: &str,
        params: &GenerationParams,
    ) -> Result<LlmResponse, SuggestionError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
    model: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: Option<String>,
}

/// OpenAI-style `/chat/completions` over HTTPS
pub struct OpenAiClient {
    client: reqwest::Client,
    url: String,
}

impl OpenAiClient {
    pub fn new(url: impl Into<String>, timeout: Option<std::time::Duration>) -> Result<Self, SuggestionError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| SuggestionError::EndpointError {
            detail: format!("Failed to create HTTP client: {}", e),
        })?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn from_config(endpoint: &EndpointConfig) -> Result<Self, SuggestionError> {
        Self::new(endpoint.url.clone(), endpoint.timeout())
    }
}

fn endpoint_error(detail: impl Into<String>) -> SuggestionError {
    SuggestionError::EndpointError {
        detail: detail.into(),
    }
}

fn describe_transport_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "Request to the completion endpoint timed out".to_string()
    } else if err.is_connect() {
        format!("Could not connect to the completion endpoint: {}", err)
    } else {
        format!("Request to the completion endpoint failed: {}", err)
    }
}

/// Map a non-success HTTP status to a user-facing message
fn describe_status(status: reqwest::StatusCode, body: &str) -> String {
    match status.as_u16() {
        401 => "Invalid API key. Set OPENAI_API_KEY or run 'mentor setup' to update it.".to_string(),
        429 => "Rate limited by the completion endpoint. Try again in a few minutes.".to_string(),
        500..=599 => format!(
            "Completion endpoint server error ({}). The service may be temporarily unavailable.",
            status
        ),
        _ => format!("API error {}: {}", status, truncate(body, 200)),
    }
}

/// Read the first choice out of a successful response body
fn parse_chat_response(body: &str) -> Result<LlmResponse, SuggestionError> {
    let parsed: ChatResponse = serde_json::from_str(body).map_err(|e| {
        endpoint_error(format!(
            "Failed to parse completion response: {} ({})",
            e,
            truncate(body, 200)
        ))
    })?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default();

    Ok(LlmResponse {
        content,
        usage: parsed.usage,
        model: parsed.model.unwrap_or_default(),
    })
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(
        &self,
        api_key: &str,
        system: &str,
        user: &str,
        params: &GenerationParams,
    ) -> Result<LlmResponse, SuggestionError> {
        let request = ChatRequest {
            model: &params.model,
            messages: vec![
                Message {
                    role: "system",
                    content: system,
                },
                Message {
                    role: "user",
                    content: user,
                },
            ],
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        debug!(url = %self.url, model = %params.model, prompt_chars = user.len(), "sending completion request");
        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| endpoint_error(describe_transport_error(&e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| endpoint_error(describe_transport_error(&e)))?;

        if !status.is_success() {
            return Err(endpoint_error(describe_status(status, &text)));
        }

        parse_chat_response(&text)
    }
}
