pub mod example_agent;

pub use example_agent::ExampleAgent;

use crate::core::agent::AgentRegistry;
use crate::domain::ports::Agent;

impl AgentRegistry {
    /// Registry preloaded with the agents shipped in this crate.
    pub fn with_builtin_agents() -> Self {
        let mut registry = Self::new();
        if let Err(e) = registry.register(example_agent::DEFAULT_AGENT_NAME, |config| {
            Box::new(ExampleAgent::new(example_agent::DEFAULT_AGENT_NAME, config)) as Box<dyn Agent>
        }) {
            tracing::error!("Failed to register built-in agent: {}", e);
        }
        registry
    }
}
