use crate::adapters::http::{self, invalid_response};
use crate::domain::ports::ModelClient;
use crate::utils::error::{JarvisError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const PROVIDER: &str = "anthropic";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http::build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    fn provider(&self) -> &str {
        PROVIDER
    }

    async fn generate(&self, model_tag: &str, prompt: &str) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| JarvisError::MissingApiKey {
            variable: "ANTHROPIC_API_KEY".to_string(),
        })?;

        let url = http::join_url(&self.base_url, "v1/messages");
        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(&MessagesRequest {
                model: model_tag,
                max_tokens: MAX_TOKENS,
                messages: vec![Message {
                    role: "user",
                    content: prompt,
                }],
            })
            .send()
            .await?;
        let response = http::ensure_success(PROVIDER, response).await?;

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| invalid_response(PROVIDER, e.to_string()))?;

        body.content
            .into_iter()
            .next()
            .and_then(|block| block.text)
            .ok_or_else(|| invalid_response(PROVIDER, "response has no content[0].text"))
    }
}
