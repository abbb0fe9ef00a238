use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serenity::async_trait;

use crate::config::CompletionConfig;
use crate::errors::{BotError, BotResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// The rate-limited upstream the queue consumer serializes calls to.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Next assistant turn for the given history.
    async fn chat(&self, history: &[ChatMessage]) -> BotResult<String>;

    /// URL of an image generated from the prompt.
    async fn image(&self, prompt: &str) -> BotResult<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
}

/// Any OpenAI-compatible HTTP endpoint.
#[derive(Clone, Debug)]
pub struct OpenAiBackend {
    client: Client,
    config: CompletionConfig,
}

impl OpenAiBackend {
    pub fn new(client: Client, config: CompletionConfig) -> Self {
        OpenAiBackend { client, config }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post<B: Serialize + ?Sized, R: for<'de> Deserialize<'de>>(&self, path: &str, body: &B) -> BotResult<R> {
        let response = self
            .client
            .post(self.endpoint(path))
            .bearer_auth(&self.config.api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(BotError::ExternalCallFailed(format!("HTTP {}: {}", status, text)));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    async fn chat(&self, history: &[ChatMessage]) -> BotResult<String> {
        let request = ChatRequest {
            model: &self.config.chat_model,
            messages: history,
        };
        let response: ChatResponse = self.post("chat/completions", &request).await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| BotError::ExternalCallFailed("No choices in response".to_string()))
    }

    async fn image(&self, prompt: &str) -> BotResult<String> {
        let request = ImageRequest {
            model: &self.config.image_model,
            prompt,
            n: 1,
        };
        let response: ImageResponse = self.post("images/generations", &request).await?;
        response
            .data
            .into_iter()
            .next()
            .and_then(|d| d.url)
            .ok_or_else(|| BotError::ExternalCallFailed("No image in response".to_string()))
    }
}
