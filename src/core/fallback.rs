use crate::adapters::ProviderRegistry;
use crate::config::toml_config::FallbackConfig;
use crate::config::{AssistantConfig, TaskConfig};
use crate::core::metrics::ModelMetrics;
use crate::domain::model::{ModelAttempt, SystemHealth};
use crate::utils::error::{JarvisError, Result};
use crate::utils::perf_log::{PerformanceEvent, PerformanceLog};
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct FallbackOptions {
    /// Attempts per model, including the first one.
    pub max_retries: u32,
    pub timeout: Duration,
    pub retry_delay: Duration,
    pub performance_log: Option<PathBuf>,
}

impl Default for FallbackOptions {
    fn default() -> Self {
        Self::from(&FallbackConfig::default())
    }
}

impl From<&FallbackConfig> for FallbackOptions {
    fn from(config: &FallbackConfig) -> Self {
        Self {
            max_retries: config.max_retries.max(1),
            timeout: Duration::from_secs(config.timeout_seconds),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            performance_log: config.performance_log.clone(),
        }
    }
}

struct AttemptContext<'a> {
    task: &'a str,
    chain: &'a [String],
    index: usize,
}

/// Runs prompts through a chain of models, retrying each before moving on.
pub struct FallbackManager {
    tasks: Vec<TaskConfig>,
    fallback_chains: HashMap<String, Vec<String>>,
    registry: ProviderRegistry,
    options: FallbackOptions,
    metrics: ModelMetrics,
    perf_log: PerformanceLog,
}

impl FallbackManager {
    pub fn new(config: &AssistantConfig, registry: ProviderRegistry) -> Self {
        Self::with_options(config, registry, FallbackOptions::from(&config.fallback))
    }

    pub fn with_options(config: &AssistantConfig, registry: ProviderRegistry, options: FallbackOptions) -> Self {
        let perf_log = PerformanceLog::new(options.performance_log.clone());
        Self {
            tasks: config.tasks.clone(),
            fallback_chains: config.fallback_chains.clone(),
            registry,
            options,
            metrics: ModelMetrics::new(),
            perf_log,
        }
    }

    pub fn options(&self) -> &FallbackOptions {
        &self.options
    }

    pub fn metrics(&self) -> &ModelMetrics {
        &self.metrics
    }

    pub fn system_health(&self) -> SystemHealth {
        self.metrics.health()
    }

    /// Sends `prompt` to each model of the task's chain until one answers.
    pub async fn execute_task(&self, task_name: &str, prompt: &str) -> Result<String> {
        let task = self
            .tasks
            .iter()
            .find(|t| t.name == task_name)
            .ok_or_else(|| JarvisError::TaskNotConfigured {
                task: task_name.to_string(),
            })?;

        if task.models.is_empty() {
            return Err(JarvisError::NoModelsConfigured {
                task: task_name.to_string(),
            });
        }

        tracing::info!("Executing task '{}' with model chain: {:?}", task_name, task.models);

        let mut attempts = Vec::new();
        let mut last_error = None;

        for (index, model_name) in task.models.iter().enumerate() {
            let Some((client, tag)) = self.registry.client_for(model_name) else {
                tracing::warn!("Skipping model '{}' as no client is available", model_name);
                continue;
            };

            let ctx = AttemptContext {
                task: task_name,
                chain: &task.models,
                index,
            };
            let (attempt, result) = self
                .run_with_retries(model_name, &ctx, || {
                    let client = Arc::clone(&client);
                    async move { client.generate(tag, prompt).await }
                })
                .await;
            attempts.push(attempt);

            match result {
                Ok(response) => return Ok(response),
                Err(e) => {
                    tracing::error!(
                        "All retries for model '{}' failed. Falling back to the next model",
                        model_name
                    );
                    last_error = Some(e.to_string());
                }
            }
        }

        Err(self.exhausted(task_name, &task.models, attempts, last_error))
    }

    /// `[fallback_chains]` entry for `task_type`, else the `text` chain.
    pub fn fallback_chain(&self, task_type: &str) -> Vec<String> {
        self.fallback_chains
            .get(task_type)
            .or_else(|| self.fallback_chains.get("text"))
            .cloned()
            .unwrap_or_default()
    }

    /// Calls `task` with each model name of the chain for `task_type` until
    /// one succeeds, returning its value and the winning attempt.
    pub async fn execute_with_fallback<T, F, Fut>(&self, task_type: &str, task: F) -> Result<(T, ModelAttempt)>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let chain = self.fallback_chain(task_type);
        if chain.is_empty() {
            return Err(JarvisError::NoModelsConfigured {
                task: task_type.to_string(),
            });
        }

        let mut attempts = Vec::new();
        let mut last_error = None;

        for (index, model_name) in chain.iter().enumerate() {
            let ctx = AttemptContext {
                task: task_type,
                chain: &chain,
                index,
            };
            let (attempt, result) = self
                .run_with_retries(model_name, &ctx, || task(model_name.clone()))
                .await;

            match result {
                Ok(value) => return Ok((value, attempt)),
                Err(e) => {
                    last_error = Some(e.to_string());
                    attempts.push(attempt);
                }
            }
        }

        Err(self.exhausted(task_type, &chain, attempts, last_error))
    }

    async fn run_with_retries<T, F, Fut>(
        &self,
        model_name: &str,
        ctx: &AttemptContext<'_>,
        mut call: F,
    ) -> (ModelAttempt, Result<T>)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_retries = self.options.max_retries.max(1);
        let mut attempt = ModelAttempt::new(model_name);
        let started = Instant::now();
        let mut last_error = None;

        for retry in 0..max_retries {
            attempt.retry_count = retry;
            tracing::info!(
                "Attempting model '{}' (attempt {}/{})",
                model_name,
                retry + 1,
                max_retries
            );

            let call_started = Instant::now();
            let outcome = match tokio::time::timeout(self.options.timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(JarvisError::Timeout {
                    model: model_name.to_string(),
                    seconds: self.options.timeout.as_secs(),
                }),
            };
            self.metrics
                .record(model_name, outcome.is_ok(), call_started.elapsed().as_secs_f64());
            attempt.duration = started.elapsed().as_secs_f64();

            match outcome {
                Ok(value) => {
                    attempt.success = true;
                    attempt.error = None;
                    tracing::info!("Received response from '{}' in {:.2}s", model_name, attempt.duration);
                    self.record_attempt(&attempt, ctx);
                    return (attempt, Ok(value));
                }
                Err(e) => {
                    tracing::warn!(
                        "Model '{}' failed on attempt {}/{}: {}",
                        model_name,
                        retry + 1,
                        max_retries,
                        e
                    );
                    attempt.error = Some(e.to_string());
                    self.record_attempt(&attempt, ctx);
                    last_error = Some(e);
                    if retry + 1 < max_retries {
                        tokio::time::sleep(self.options.retry_delay).await;
                    }
                }
            }
        }

        let error = last_error.unwrap_or_else(|| JarvisError::ConfigValidationError {
            field: "fallback.max_retries".to_string(),
            message: "must be at least 1".to_string(),
        });
        (attempt, Err(error))
    }

    fn record_attempt(&self, attempt: &ModelAttempt, ctx: &AttemptContext<'_>) {
        self.perf_log.record(PerformanceEvent::ModelAttempt {
            model_name: attempt.model_name.clone(),
            success: attempt.success,
            error: attempt.error.clone(),
            duration: attempt.duration,
            retry_count: attempt.retry_count,
            task: ctx.task.to_string(),
            fallback_chain: ctx.chain.to_vec(),
            fallback_index: ctx.index,
        });
    }

    fn exhausted(
        &self,
        task: &str,
        chain: &[String],
        attempts: Vec<ModelAttempt>,
        last_error: Option<String>,
    ) -> JarvisError {
        let total_calls = attempts.iter().map(|a| a.retry_count as usize + 1).sum();
        let last_error = last_error.unwrap_or_else(|| "no model client available".to_string());
        tracing::error!("Task '{}' failed: every model in the chain failed. Last error: {}", task, last_error);

        self.perf_log.record(PerformanceEvent::FallbackChainExhausted {
            task: task.to_string(),
            fallback_chain: chain.to_vec(),
            attempts,
            last_error: Some(last_error.clone()),
        });

        JarvisError::FallbackExhausted {
            task: task.to_string(),
            attempts: total_calls,
            last_error,
        }
    }
}

impl std::fmt::Debug for FallbackManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackManager")
            .field("tasks", &self.tasks.iter().map(|t| &t.name).collect::<Vec<_>>())
            .field("registry", &self.registry)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::ModelClient;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Fails the first `failures` calls, then answers with its provider name.
    struct Scripted {
        provider: &'static str,
        failures: usize,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl Scripted {
        fn new(provider: &'static str, failures: usize) -> Arc<Self> {
            Arc::new(Self {
                provider,
                failures,
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            })
        }

        fn slow(provider: &'static str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                provider,
                failures: 0,
                calls: AtomicUsize::new(0),
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModelClient for Scripted {
        fn provider(&self) -> &str {
            self.provider
        }

        async fn generate(&self, model_tag: &str, _prompt: &str) -> Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if call < self.failures {
                return Err(JarvisError::ProviderError {
                    provider: self.provider.to_string(),
                    status: 500,
                    message: format!("{} unavailable", model_tag),
                });
            }
            Ok(format!("{} answered", self.provider))
        }
    }

    fn config() -> AssistantConfig {
        AssistantConfig::from_toml_str(
            r#"
[[tasks]]
name = "general_chat"
models = ["local/llama3:8b", "missing/some-model", "cloud/gpt-4o-mini"]

[[tasks]]
name = "empty"

[fallback_chains]
text = ["local/llama3:8b", "cloud/gpt-4o-mini"]
code = ["local/codellama:7b-instruct"]
"#,
        )
        .unwrap()
    }

    fn options(log: Option<PathBuf>) -> FallbackOptions {
        FallbackOptions {
            max_retries: 2,
            timeout: Duration::from_millis(200),
            retry_delay: Duration::from_millis(1),
            performance_log: log,
        }
    }

    fn manager(clients: &[Arc<Scripted>], log: Option<PathBuf>) -> FallbackManager {
        let mut registry = ProviderRegistry::new();
        for client in clients {
            registry.register(client.clone());
        }
        FallbackManager::with_options(&config(), registry, options(log))
    }

    #[tokio::test]
    async fn test_primary_model_answers() {
        let local = Scripted::new("local", 0);
        let cloud = Scripted::new("cloud", 0);
        let manager = manager(&[local.clone(), cloud.clone()], None);

        let answer = manager.execute_task("general_chat", "hi").await.unwrap();

        assert_eq!(answer, "local answered");
        assert_eq!(local.calls(), 1);
        assert_eq!(cloud.calls(), 0);
    }

    #[tokio::test]
    async fn test_retry_then_success_on_same_model() {
        let local = Scripted::new("local", 1);
        let manager = manager(&[local.clone()], None);

        let answer = manager.execute_task("general_chat", "hi").await.unwrap();

        assert_eq!(answer, "local answered");
        assert_eq!(local.calls(), 2);
        assert_eq!(manager.metrics().success_rate("local/llama3:8b"), 0.5);
    }

    #[tokio::test]
    async fn test_falls_back_and_skips_unknown_providers() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("perf.log");
        let local = Scripted::new("local", usize::MAX);
        let cloud = Scripted::new("cloud", 0);
        let manager = manager(&[local.clone(), cloud.clone()], Some(log.clone()));

        let answer = manager.execute_task("general_chat", "hi").await.unwrap();

        assert_eq!(answer, "cloud answered");
        assert_eq!(local.calls(), 2);
        assert_eq!(cloud.calls(), 1);

        let lines: Vec<serde_json::Value> = std::fs::read_to_string(&log)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["event"], "model_attempt");
        assert_eq!(lines[1]["retry_count"], 1);
        assert_eq!(lines[2]["model_name"], "cloud/gpt-4o-mini");
        assert_eq!(lines[2]["fallback_index"], 2);
        assert_eq!(lines[2]["success"], true);
    }

    #[tokio::test]
    async fn test_all_models_fail() {
        let local = Scripted::new("local", usize::MAX);
        let cloud = Scripted::new("cloud", usize::MAX);
        let manager = manager(&[local, cloud], None);

        let err = manager.execute_task("general_chat", "hi").await.unwrap_err();

        match err {
            JarvisError::FallbackExhausted { task, attempts, last_error } => {
                assert_eq!(task, "general_chat");
                assert_eq!(attempts, 4);
                assert!(last_error.contains("gpt-4o-mini unavailable"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(manager.system_health().overall_health.to_string(), "degraded");
    }

    #[tokio::test]
    async fn test_unknown_task_and_empty_chain() {
        let manager = manager(&[], None);
        assert!(matches!(
            manager.execute_task("weather", "hi").await,
            Err(JarvisError::TaskNotConfigured { .. })
        ));
        assert!(matches!(
            manager.execute_task("empty", "hi").await,
            Err(JarvisError::NoModelsConfigured { .. })
        ));
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let local = Scripted::slow("local", Duration::from_secs(5));
        let cloud = Scripted::new("cloud", 0);
        let manager = manager(&[local.clone(), cloud], None);

        let answer = manager.execute_task("general_chat", "hi").await.unwrap();

        assert_eq!(answer, "cloud answered");
        assert_eq!(local.calls(), 2);
        assert_eq!(manager.metrics().success_rate("local/llama3:8b"), 0.0);
    }

    #[test]
    fn test_fallback_chain_defaults_to_text() {
        let manager = manager(&[], None);
        assert_eq!(manager.fallback_chain("code"), vec!["local/codellama:7b-instruct"]);
        assert_eq!(manager.fallback_chain("audio"), manager.fallback_chain("text"));
    }

    #[tokio::test]
    async fn test_execute_with_fallback() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("perf.log");
        let manager = manager(&[], Some(log.clone()));

        let (value, attempt) = manager
            .execute_with_fallback("text", |model| async move {
                if model.starts_with("local/") {
                    Err(JarvisError::InvalidResponse {
                        provider: "local".to_string(),
                        message: "garbled".to_string(),
                    })
                } else {
                    Ok(model.len())
                }
            })
            .await
            .unwrap();

        assert_eq!(value, "cloud/gpt-4o-mini".len());
        assert_eq!(attempt.model_name, "cloud/gpt-4o-mini");
        assert!(attempt.success);
        assert_eq!(attempt.retry_count, 0);

        let failed = manager
            .execute_with_fallback("code", |model| async move {
                Err::<(), _>(JarvisError::UnknownModel { model })
            })
            .await;
        assert!(matches!(failed, Err(JarvisError::FallbackExhausted { attempts: 2, .. })));

        let content = std::fs::read_to_string(&log).unwrap();
        let last: serde_json::Value = serde_json::from_str(content.lines().last().unwrap()).unwrap();
        assert_eq!(last["event"], "fallback_chain_exhausted");
        assert_eq!(last["attempts"].as_array().unwrap().len(), 1);
        assert!(last["timestamp"].as_f64().unwrap() > 0.0);
    }
}
