use crate::adapters::ProviderRegistry;
use crate::config::settings::SettingsSummary;
use crate::config::{AssistantConfig, Settings, TaskConfig};
use crate::core::agent::run_agent_task;
use crate::core::fallback::FallbackManager;
use crate::core::router::TaskRouter;
use crate::domain::model::{AgentStatus, SystemHealth};
use crate::domain::ports::Agent;
use crate::utils::error::{JarvisError, Result};
use serde::Serialize;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const UNROUTED_RESPONSE: &str = "I'm not sure how to handle that request. Could you be more specific?";

#[derive(Debug, Clone, Serialize)]
pub struct JarvisStatus {
    pub name: String,
    pub version: &'static str,
    pub is_listening: bool,
    pub config: SettingsSummary,
}

/// The assistant: owns the router, the fallback manager and the agents.
pub struct Jarvis {
    name: String,
    settings: Settings,
    router: TaskRouter,
    fallback: FallbackManager,
    agents: Vec<Box<dyn Agent>>,
    is_listening: bool,
}

impl Jarvis {
    pub fn new(settings: Settings, config: &AssistantConfig, registry: ProviderRegistry) -> Self {
        Self::with_fallback(settings, config, FallbackManager::new(config, registry))
    }

    pub fn with_fallback(settings: Settings, config: &AssistantConfig, fallback: FallbackManager) -> Self {
        let name = config
            .assistant
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| settings.name.clone());
        tracing::info!("Jarvis assistant '{}' initialized", name);

        Self {
            name,
            settings,
            router: TaskRouter::new(config),
            fallback,
            agents: Vec::new(),
            is_listening: false,
        }
    }

    /// Overrides the configured name, e.g. from `--name`.
    pub fn with_name(mut self, name: Option<String>) -> Self {
        if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
            self.name = name;
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn greet(&self) -> String {
        let greeting = format!(
            "Hello! I am {}, your personal assistant. How may I assist you today?",
            self.name
        );
        tracing::info!("Greeting user: {}", greeting);
        greeting
    }

    pub fn start_listening(&mut self) {
        self.is_listening = true;
        tracing::info!("{} started listening", self.name);
    }

    pub fn stop_listening(&mut self) {
        self.is_listening = false;
        tracing::info!("{} stopped listening", self.name);
    }

    pub fn is_listening(&self) -> bool {
        self.is_listening
    }

    pub fn register_agent(&mut self, agent: Box<dyn Agent>) -> Result<()> {
        if self.agent(agent.name()).is_some() {
            return Err(JarvisError::AgentAlreadyRegistered {
                name: agent.name().to_string(),
            });
        }
        tracing::info!("Registered agent: {}", agent.name());
        self.agents.push(agent);
        Ok(())
    }

    /// Initializes every agent; a failing agent is logged and skipped.
    pub async fn initialize_agents(&mut self) {
        tracing::info!("Initializing all registered agents...");
        for agent in self.agents.iter_mut() {
            match agent.initialize().await {
                Ok(()) => tracing::info!("Agent '{}' initialized successfully", agent.name()),
                Err(e) => tracing::error!("Failed to initialize agent '{}': {}", agent.name(), e),
            }
        }
    }

    pub async fn shutdown_agents(&mut self) {
        tracing::info!("Shutting down all registered agents...");
        for agent in self.agents.iter_mut() {
            match agent.shutdown().await {
                Ok(()) => tracing::info!("Agent '{}' shut down successfully", agent.name()),
                Err(e) => tracing::error!("Error shutting down agent '{}': {}", agent.name(), e),
            }
        }
    }

    pub fn agent(&self, name: &str) -> Option<&dyn Agent> {
        self.agents.iter().find(|a| a.name() == name).map(|a| a.as_ref())
    }

    pub fn agent_status(&self, name: &str) -> Option<AgentStatus> {
        self.agent(name).map(|a| a.status())
    }

    pub fn agent_statuses(&self) -> Vec<AgentStatus> {
        self.agents.iter().map(|a| a.status()).collect()
    }

    pub async fn run_agent(&mut self, name: &str, input: serde_json::Value) -> Result<serde_json::Value> {
        let available = self
            .agents
            .iter()
            .map(|a| a.name().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let agent = self
            .agents
            .iter_mut()
            .find(|a| a.name() == name)
            .ok_or_else(|| JarvisError::UnknownAgent {
                name: name.to_string(),
                available,
            })?;
        run_agent_task(agent.as_mut(), input).await
    }

    pub fn route(&self, prompt: &str) -> Option<&TaskConfig> {
        self.router.route(prompt)
    }

    pub fn router(&self) -> &TaskRouter {
        &self.router
    }

    pub fn fallback(&self) -> &FallbackManager {
        &self.fallback
    }

    /// Routes the prompt and answers it. Failures are turned into a message
    /// for the user.
    pub async fn process_user_prompt(&self, prompt: &str) -> String {
        tracing::info!("Processing prompt: '{}'", prompt);

        let Some(task) = self.router.route(prompt) else {
            tracing::warn!("No route found for prompt, returning default response");
            return UNROUTED_RESPONSE.to_string();
        };
        tracing::info!("Prompt routed to task: '{}'", task.name);

        match self.fallback.execute_task(&task.name, prompt).await {
            Ok(response) => {
                tracing::debug!("Received response for task '{}': '{}'", task.name, response);
                response
            }
            Err(e) => {
                tracing::error!("Failed to process prompt: {}", e);
                format!(
                    "An error occurred while processing your request: {}\n{}",
                    e.user_friendly_message(),
                    e.recovery_suggestion()
                )
            }
        }
    }

    pub fn system_health(&self) -> SystemHealth {
        self.fallback.system_health()
    }

    pub fn status(&self) -> JarvisStatus {
        JarvisStatus {
            name: self.name.clone(),
            version: VERSION,
            is_listening: self.is_listening,
            config: self.settings.to_summary(),
        }
    }
}
