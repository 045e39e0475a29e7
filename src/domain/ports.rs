use crate::domain::model::AgentStatus;
use crate::utils::error::{JarvisError, Result};
use async_trait::async_trait;

/// A backend able to answer a prompt with a given model tag.
#[async_trait]
pub trait ModelClient: Send + Sync {
    fn provider(&self) -> &str;
    async fn generate(&self, model_tag: &str, prompt: &str) -> Result<String>;
}

/// Lists the models installed on a local model server.
#[async_trait]
pub trait ModelInventory: Send + Sync {
    async fn installed_models(&self) -> Result<Vec<String>>;
}

pub trait MemoryProbe: Send + Sync {
    /// Total accelerator memory in MB, `None` when it cannot be determined.
    fn total_memory_mb(&self) -> Option<u64>;
}

#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;
    fn is_initialized(&self) -> bool;
    async fn initialize(&mut self) -> Result<()>;
    async fn process(&mut self, input: serde_json::Value) -> Result<serde_json::Value>;
    async fn shutdown(&mut self) -> Result<()>;
    fn status(&self) -> AgentStatus;

    /// Records a failure against the agent's own metrics.
    fn log_error(&mut self, _error: &JarvisError, _context: serde_json::Value) {}
}
