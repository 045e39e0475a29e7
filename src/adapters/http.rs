use crate::utils::error::{JarvisError, Result};
use reqwest::{Client, Response};
use std::time::Duration;

/// Longest slice of an error body kept in `ProviderError` messages.
const MAX_ERROR_BODY: usize = 500;

pub fn build_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Passes 2xx responses through; otherwise reads the body into a `ProviderError`.
pub async fn ensure_success(provider: &str, response: Response) -> Result<Response> {
    let status = response.status();
    tracing::debug!("{} response status: {}", provider, status);
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message: String = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        body.trim().chars().take(MAX_ERROR_BODY).collect()
    };

    Err(JarvisError::ProviderError {
        provider: provider.to_string(),
        status: status.as_u16(),
        message,
    })
}

pub fn invalid_response(provider: &str, message: impl Into<String>) -> JarvisError {
    JarvisError::InvalidResponse {
        provider: provider.to_string(),
        message: message.into(),
    }
}
