use crate::adapters::http::{self, invalid_response};
use crate::domain::ports::ModelClient;
use crate::utils::error::{JarvisError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Chat-completions client shared by OpenAI and DeepSeek.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleClient {
    client: Client,
    provider: String,
    base_url: String,
    api_key: Option<String>,
    api_key_variable: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatibleClient {
    pub fn new(
        provider: &str,
        base_url: &str,
        api_key: Option<String>,
        api_key_variable: &str,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: http::build_client(timeout)?,
            provider: provider.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            api_key_variable: api_key_variable.to_string(),
        })
    }

    pub fn openai(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        Self::new("openai", base_url, api_key, "OPENAI_API_KEY", timeout)
    }

    pub fn deepseek(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        Self::new("deepseek", base_url, api_key, "DEEPSEEK_API_KEY", timeout)
    }
}

#[async_trait]
impl ModelClient for OpenAiCompatibleClient {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn generate(&self, model_tag: &str, prompt: &str) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| JarvisError::MissingApiKey {
            variable: self.api_key_variable.clone(),
        })?;

        let url = http::join_url(&self.base_url, "chat/completions");
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&ChatRequest {
                model: model_tag,
                messages: vec![ChatMessage {
                    role: "user",
                    content: prompt,
                }],
            })
            .send()
            .await?;
        let response = http::ensure_success(&self.provider, response).await?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| invalid_response(&self.provider, e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| invalid_response(&self.provider, "response has no choices[0].message.content"))
    }
}
