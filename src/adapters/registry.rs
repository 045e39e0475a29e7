use crate::adapters::anthropic::AnthropicClient;
use crate::adapters::ollama::OllamaClient;
use crate::adapters::openai::OpenAiCompatibleClient;
use crate::config::{AssistantConfig, Settings};
use crate::domain::model::ModelRef;
use crate::domain::ports::ModelClient;
use crate::utils::error::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Maps a provider name (`ollama`, `openai`, ...) to its client.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    clients: HashMap<String, Arc<dyn ModelClient>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers Ollama, OpenAI, DeepSeek and Anthropic. Missing API keys are
    /// not an error here; the affected client fails when called.
    pub fn from_config(config: &AssistantConfig, settings: &Settings, timeout: Duration) -> Result<Self> {
        let providers = &config.providers;
        let mut registry = Self::new();

        registry.register(Arc::new(OllamaClient::new(&config.ollama_url(settings), timeout)?));
        registry.register(Arc::new(OpenAiCompatibleClient::openai(
            &providers.openai_base_url,
            config.openai_api_key(settings),
            timeout,
        )?));
        registry.register(Arc::new(OpenAiCompatibleClient::deepseek(
            &providers.deepseek_base_url,
            config.deepseek_api_key(settings),
            timeout,
        )?));
        registry.register(Arc::new(AnthropicClient::new(
            &providers.anthropic_base_url,
            config.anthropic_api_key(settings),
            timeout,
        )?));

        tracing::debug!("Registered providers: {}", registry.provider_names().join(", "));
        Ok(registry)
    }

    /// Replaces any client already registered under the same provider name.
    pub fn register(&mut self, client: Arc<dyn ModelClient>) {
        self.clients.insert(client.provider().to_string(), client);
    }

    pub fn get(&self, provider: &str) -> Option<Arc<dyn ModelClient>> {
        self.clients.get(provider).cloned()
    }

    /// Client for a `provider/tag` model name, along with the tag.
    pub fn client_for<'a>(&self, model_name: &'a str) -> Option<(Arc<dyn ModelClient>, &'a str)> {
        let model_ref = ModelRef::parse(model_name)?;
        self.get(model_ref.provider).map(|client| (client, model_ref.tag))
    }

    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clients.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.provider_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl ModelClient for Echo {
        fn provider(&self) -> &str {
            "echo"
        }

        async fn generate(&self, model_tag: &str, prompt: &str) -> Result<String> {
            Ok(format!("{}:{}", model_tag, prompt))
        }
    }

    #[test]
    fn test_from_builtin_config_registers_all_providers() {
        let config = AssistantConfig::builtin().unwrap();
        let registry =
            ProviderRegistry::from_config(&config, &Settings::default(), Duration::from_secs(5)).unwrap();
        assert_eq!(
            registry.provider_names(),
            vec!["anthropic", "deepseek", "ollama", "openai"]
        );
    }

    #[tokio::test]
    async fn test_client_for_resolves_provider_and_tag() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(Echo));

        let (client, tag) = registry.client_for("echo/llama3:8b").unwrap();
        assert_eq!(tag, "llama3:8b");
        assert_eq!(client.generate(tag, "hi").await.unwrap(), "llama3:8b:hi");

        assert!(registry.client_for("unknown/model").is_none());
        assert!(registry.client_for("llama3:8b").is_none());
    }
}
