use crate::domain::model::AgentStatus;
use crate::domain::ports::Agent;
use crate::utils::error::{JarvisError, Result};
use crate::utils::validation;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub type AgentConfig = Map<String, Value>;
pub type AgentFactory = Arc<dyn Fn(AgentConfig) -> Box<dyn Agent> + Send + Sync>;

/// Bookkeeping shared by every agent implementation.
#[derive(Debug, Clone)]
pub struct AgentState {
    pub name: String,
    pub config: AgentConfig,
    initialized: bool,
    last_updated: DateTime<Utc>,
    metrics: Map<String, Value>,
}

impl AgentState {
    pub fn new(name: &str, config: AgentConfig) -> Self {
        tracing::info!("Initializing agent: {}", name);
        let now = Utc::now();
        let mut metrics = Map::new();
        metrics.insert("start_time".to_string(), Value::String(now.to_rfc3339()));
        metrics.insert("requests_processed".to_string(), Value::from(0u64));
        metrics.insert("errors".to_string(), Value::from(0u64));
        metrics.insert("last_error".to_string(), Value::Null);

        Self {
            name: name.to_string(),
            config,
            initialized: false,
            last_updated: now,
            metrics,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn mark_initialized(&mut self) {
        self.initialized = true;
        self.touch();
        tracing::info!("Agent {} initialized successfully", self.name);
    }

    pub fn mark_shutdown(&mut self) {
        self.initialized = false;
        self.touch();
        tracing::info!("Agent {} shut down successfully", self.name);
    }

    pub fn record_request(&mut self) {
        self.increment("requests_processed");
        self.touch();
    }

    pub fn log_error(&mut self, error: &JarvisError, context: Value) {
        self.increment("errors");
        self.metrics.insert(
            "last_error".to_string(),
            json!({
                "timestamp": Utc::now().to_rfc3339(),
                "error_type": format!("{:?}", error.category()),
                "error_message": error.to_string(),
                "context": context,
            }),
        );
        self.touch();
        tracing::error!("Error in agent {}: {}", self.name, error);
    }

    /// Merges `updates` into the metrics, overwriting existing keys.
    pub fn update_metrics(&mut self, updates: Map<String, Value>) {
        self.metrics.extend(updates);
        self.touch();
    }

    pub fn metrics(&self) -> &Map<String, Value> {
        &self.metrics
    }

    pub fn status(&self) -> AgentStatus {
        AgentStatus {
            agent_name: self.name.clone(),
            status: if self.initialized { "initialized" } else { "uninitialized" }.to_string(),
            last_updated: self.last_updated.to_rfc3339(),
            metrics: self.metrics.clone(),
        }
    }

    fn increment(&mut self, key: &str) {
        let current = self.metrics.get(key).and_then(Value::as_u64).unwrap_or(0);
        self.metrics.insert(key.to_string(), Value::from(current + 1));
    }

    fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}

/// Named agent factories.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    factories: BTreeMap<String, AgentFactory>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &str, factory: F) -> Result<()>
    where
        F: Fn(AgentConfig) -> Box<dyn Agent> + Send + Sync + 'static,
    {
        let key = name.to_lowercase();
        if self.factories.contains_key(&key) {
            return Err(JarvisError::AgentAlreadyRegistered { name: key });
        }
        self.factories.insert(key, Arc::new(factory));
        Ok(())
    }

    /// Builds a new agent; names are matched case-insensitively.
    pub fn create(&self, name: &str, config: AgentConfig) -> Result<Box<dyn Agent>> {
        let factory = self
            .factories
            .get(&name.to_lowercase())
            .ok_or_else(|| JarvisError::UnknownAgent {
                name: name.to_string(),
                available: self.names().join(", "),
            })?;
        Ok(factory(config))
    }

    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry").field("agents", &self.names()).finish()
    }
}

pub fn validate_agent_config(config: &AgentConfig, required: &[&str]) -> Result<()> {
    let missing = validation::missing_fields(required, |field| {
        config.get(field).map(|v| !v.is_null()).unwrap_or(false)
    });
    if missing.is_empty() {
        Ok(())
    } else {
        Err(JarvisError::MissingConfigError {
            field: missing.join(", "),
        })
    }
}

/// Runs `op` up to `max_retries` times, sleeping `delay * attempt` between
/// failures.
pub async fn retry_async<T, F, Fut>(label: &str, max_retries: u32, delay: Duration, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_retries = max_retries.max(1);
    let mut last_error = String::new();

    for attempt in 0..max_retries {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::warn!("{} attempt {}/{} failed: {}", label, attempt + 1, max_retries, e);
                last_error = e.to_string();
                if attempt + 1 < max_retries {
                    tokio::time::sleep(delay * (attempt + 1)).await;
                }
            }
        }
    }

    Err(JarvisError::AgentProcessingError {
        agent: label.to_string(),
        message: format!("failed after {} attempts: {}", max_retries, last_error),
    })
}

/// Retry and timeout settings an agent reads from its configuration map
/// (`max_retries`, `retry_delay` and `timeout`, both in seconds).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Missing or unusable values keep their defaults.
    pub fn from_config(config: &AgentConfig) -> Self {
        let defaults = Self::default();
        let seconds = |key: &str| {
            config
                .get(key)
                .and_then(Value::as_f64)
                .and_then(|v| Duration::try_from_secs_f64(v).ok())
        };

        Self {
            max_retries: config
                .get("max_retries")
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.max_retries),
            retry_delay: seconds("retry_delay").unwrap_or(defaults.retry_delay),
            timeout: seconds("timeout")
                .filter(|t| !t.is_zero())
                .unwrap_or(defaults.timeout),
        }
    }

    /// `retry_async` bounded by `timeout` as a whole.
    pub async fn run<T, F, Fut>(&self, label: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, retry_async(label, self.max_retries, self.retry_delay, op)).await {
            Ok(result) => result,
            Err(_) => Err(JarvisError::AgentProcessingError {
                agent: label.to_string(),
                message: format!("timed out after {:.1}s", self.timeout.as_secs_f64()),
            }),
        }
    }
}

/// Initializes the agent if needed, then processes `input`. Failures are
/// logged on the agent and reported as `AgentProcessingError`.
pub async fn run_agent_task(agent: &mut dyn Agent, input: Value) -> Result<Value> {
    let outcome = async {
        if !agent.is_initialized() {
            agent.initialize().await?;
        }
        agent.process(input.clone()).await
    }
    .await;

    match outcome {
        Ok(result) => Ok(result),
        Err(e) => {
            agent.log_error(&e, json!({ "input_data": input }));
            Err(JarvisError::AgentProcessingError {
                agent: agent.name().to_string(),
                message: e.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        state: AgentState,
        fail_init: bool,
    }

    #[async_trait]
    impl Agent for Flaky {
        fn name(&self) -> &str {
            &self.state.name
        }

        fn is_initialized(&self) -> bool {
            self.state.is_initialized()
        }

        async fn initialize(&mut self) -> Result<()> {
            if self.fail_init {
                return Err(JarvisError::AgentInitializationError {
                    agent: self.state.name.clone(),
                    message: "model server offline".to_string(),
                });
            }
            self.state.mark_initialized();
            Ok(())
        }

        async fn process(&mut self, input: Value) -> Result<Value> {
            self.state.record_request();
            Ok(json!({ "echo": input }))
        }

        async fn shutdown(&mut self) -> Result<()> {
            self.state.mark_shutdown();
            Ok(())
        }

        fn status(&self) -> AgentStatus {
            self.state.status()
        }

        fn log_error(&mut self, error: &JarvisError, context: Value) {
            self.state.log_error(error, context);
        }
    }

    fn flaky(fail_init: bool) -> Flaky {
        Flaky {
            state: AgentState::new("flaky", Map::new()),
            fail_init,
        }
    }

    #[test]
    fn test_agent_state_metrics() {
        let mut state = AgentState::new("example_agent", Map::new());
        assert_eq!(state.status().status, "uninitialized");

        state.mark_initialized();
        state.record_request();
        state.record_request();
        let mut updates = Map::new();
        updates.insert("last_success".to_string(), json!("now"));
        state.update_metrics(updates);

        let status = state.status();
        assert_eq!(status.status, "initialized");
        assert_eq!(status.metrics["requests_processed"], 2);
        assert_eq!(status.metrics["last_success"], "now");

        state.log_error(
            &JarvisError::MissingConfigError {
                field: "greeting".to_string(),
            },
            json!({"step": "init"}),
        );
        assert_eq!(state.metrics()["errors"], 1);
        assert_eq!(state.metrics()["last_error"]["error_type"], "Configuration");
        assert_eq!(state.metrics()["last_error"]["context"]["step"], "init");
    }

    #[test]
    fn test_registry_register_and_create() {
        let mut registry = AgentRegistry::new();
        registry.register("Flaky", |_config| Box::new(flaky(false)) as Box<dyn Agent>).unwrap();

        assert!(matches!(
            registry.register("flaky", |_config| Box::new(flaky(false)) as Box<dyn Agent>),
            Err(JarvisError::AgentAlreadyRegistered { .. })
        ));
        assert_eq!(registry.create("FLAKY", Map::new()).unwrap().name(), "flaky");

        match registry.create("weather", Map::new()) {
            Err(JarvisError::UnknownAgent { available, .. }) => assert_eq!(available, "flaky"),
            Err(other) => panic!("unexpected error: {:?}", other),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[test]
    fn test_validate_agent_config() {
        let mut config = Map::new();
        config.insert("greeting".to_string(), json!("hi"));
        config.insert("features".to_string(), Value::Null);

        assert!(validate_agent_config(&config, &["greeting"]).is_ok());
        match validate_agent_config(&config, &["greeting", "features", "max_processing_time"]) {
            Err(JarvisError::MissingConfigError { field }) => {
                assert_eq!(field, "features, max_processing_time")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_retry_async_succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let value = retry_async("demo", 3, Duration::from_millis(1), || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(JarvisError::UnknownModel { model: "x".to_string() })
            } else {
                Ok(n)
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_async_gives_up() {
        let result: Result<()> = retry_async("demo", 2, Duration::from_millis(1), || async {
            Err(JarvisError::UnknownModel { model: "x".to_string() })
        })
        .await;

        let message = result.unwrap_err().to_string();
        assert!(message.contains("failed after 2 attempts"));
    }

    #[test]
    fn test_retry_policy_from_config() {
        assert_eq!(RetryPolicy::from_config(&Map::new()), RetryPolicy::default());

        let mut config = Map::new();
        config.insert("max_retries".to_string(), json!(5));
        config.insert("retry_delay".to_string(), json!(0.25));
        config.insert("timeout".to_string(), json!(2));
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.retry_delay, Duration::from_millis(250));
        assert_eq!(policy.timeout, Duration::from_secs(2));

        config.insert("max_retries".to_string(), json!(0));
        config.insert("retry_delay".to_string(), json!(-1.0));
        config.insert("timeout".to_string(), json!("soon"));
        assert_eq!(RetryPolicy::from_config(&config), RetryPolicy::default());
    }

    #[tokio::test]
    async fn test_retry_policy_times_out() {
        let policy = RetryPolicy {
            max_retries: 3,
            retry_delay: Duration::ZERO,
            timeout: Duration::from_millis(20),
        };
        let result: Result<()> = policy
            .run("slow", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(result.unwrap_err().to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_run_agent_task_initializes_on_demand() {
        let mut agent = flaky(false);
        let result = run_agent_task(&mut agent, json!({"request_id": "r1"})).await.unwrap();

        assert!(agent.is_initialized());
        assert_eq!(result["echo"]["request_id"], "r1");
    }

    #[tokio::test]
    async fn test_run_agent_task_wraps_failures() {
        let mut agent = flaky(true);
        let err = run_agent_task(&mut agent, json!({})).await.unwrap_err();

        assert!(matches!(err, JarvisError::AgentProcessingError { .. }));
        assert_eq!(agent.status().metrics["errors"], 1);
    }
}
