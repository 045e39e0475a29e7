use crate::core::agent::{validate_agent_config, AgentConfig, AgentState, RetryPolicy};
use crate::domain::model::AgentStatus;
use crate::domain::ports::Agent;
use crate::utils::error::{JarvisError, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};

pub const DEFAULT_AGENT_NAME: &str = "example_agent";

const REQUIRED_FIELDS: [&str; 2] = ["greeting", "max_processing_time"];

/// Reference agent: greets, counts requests and echoes its configuration.
#[derive(Debug, Clone)]
pub struct ExampleAgent {
    state: AgentState,
    counter: u64,
}

impl ExampleAgent {
    pub fn new(name: &str, overrides: AgentConfig) -> Self {
        let mut config = default_config();
        config.extend(overrides);
        Self {
            state: AgentState::new(name, config),
            counter: 0,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.state.config
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    fn handle(&mut self, input: &Value) -> Result<Value> {
        if !self.state.is_initialized() {
            return Err(JarvisError::AgentProcessingError {
                agent: self.state.name.clone(),
                message: "Agent not initialized".to_string(),
            });
        }
        tracing::debug!("{} processing input: {}", self.state.name, input);

        self.counter += 1;
        let now = Utc::now().to_rfc3339();
        self.state.record_request();
        let mut updates = Map::new();
        updates.insert("last_processed".to_string(), Value::String(now.clone()));
        self.state.update_metrics(updates);

        let config = &self.state.config;
        Ok(json!({
            "status": "success",
            "message": config.get("greeting").cloned().unwrap_or(Value::Null),
            "request_id": input.get("request_id").cloned().unwrap_or_else(|| json!("unknown")),
            "processed_by": self.state.name,
            "counter": self.counter,
            "timestamp": now,
            "config": {
                "features": config.get("features").cloned().unwrap_or(Value::Null),
                "max_processing_time": config.get("max_processing_time").cloned().unwrap_or(Value::Null),
            },
        }))
    }
}

impl Default for ExampleAgent {
    fn default() -> Self {
        Self::new(DEFAULT_AGENT_NAME, Map::new())
    }
}

fn default_config() -> AgentConfig {
    let mut config = Map::new();
    config.insert("greeting".to_string(), json!("Hello from ExampleAgent!"));
    config.insert("max_processing_time".to_string(), json!(10.0));
    config.insert("features".to_string(), json!(["feature1", "feature2"]));
    config
}

#[async_trait]
impl Agent for ExampleAgent {
    fn name(&self) -> &str {
        &self.state.name
    }

    fn is_initialized(&self) -> bool {
        self.state.is_initialized()
    }

    async fn initialize(&mut self) -> Result<()> {
        tracing::info!("Initializing {}...", self.state.name);
        validate_agent_config(&self.state.config, &REQUIRED_FIELDS).map_err(|e| {
            JarvisError::AgentInitializationError {
                agent: self.state.name.clone(),
                message: e.to_string(),
            }
        })?;
        self.state.mark_initialized();
        Ok(())
    }

    /// Retried and bounded by the `max_retries`, `retry_delay` and `timeout`
    /// entries of the agent configuration.
    async fn process(&mut self, input: Value) -> Result<Value> {
        let policy = RetryPolicy::from_config(&self.state.config);
        let label = self.state.name.clone();
        policy
            .run(&label, || {
                let outcome = self.handle(&input);
                async move { outcome }
            })
            .await
    }

    async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("Shutting down {}...", self.state.name);
        self.state.mark_shutdown();
        Ok(())
    }

    fn status(&self) -> AgentStatus {
        let mut status = self.state.status();
        status.metrics.insert("counter".to_string(), json!(self.counter));
        status
    }

    fn log_error(&mut self, error: &JarvisError, context: Value) {
        self.state.log_error(error, context);
    }
}
