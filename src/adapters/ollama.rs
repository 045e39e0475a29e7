use crate::adapters::http::{self, invalid_response};
use crate::domain::ports::{ModelClient, ModelInventory};
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const PROVIDER: &str = "ollama";

/// Client for a local or remote Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http::build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// The server may answer with NDJSON even when streaming is off; the last
/// non-empty line carries the final response.
fn parse_generate_body(body: &str) -> Result<String> {
    let last_line = body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .ok_or_else(|| invalid_response(PROVIDER, "empty response body"))?;

    let chunk: GenerateChunk = serde_json::from_str(last_line)
        .map_err(|e| invalid_response(PROVIDER, format!("malformed JSON line: {}", e)))?;
    Ok(chunk.response)
}

#[async_trait]
impl ModelClient for OllamaClient {
    fn provider(&self) -> &str {
        PROVIDER
    }

    async fn generate(&self, model_tag: &str, prompt: &str) -> Result<String> {
        let url = http::join_url(&self.base_url, "api/generate");
        tracing::debug!("Sending prompt to {} via {}", model_tag, url);

        let response = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                model: model_tag,
                prompt,
                stream: false,
            })
            .send()
            .await?;
        let response = http::ensure_success(PROVIDER, response).await?;
        let body = response.text().await?;

        parse_generate_body(&body)
    }
}

#[async_trait]
impl ModelInventory for OllamaClient {
    async fn installed_models(&self) -> Result<Vec<String>> {
        let url = http::join_url(&self.base_url, "api/tags");
        let response = self.client.get(&url).send().await?;
        let response = http::ensure_success(PROVIDER, response).await?;
        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| invalid_response(PROVIDER, e.to_string()))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}
