pub mod agent_config;
#[cfg(feature = "cli")]
pub mod cli;
pub mod settings;
pub mod toml_config;

pub use agent_config::AgentSettings;
pub use settings::Settings;
pub use toml_config::{AssistantConfig, TaskConfig};
