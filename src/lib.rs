pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::{Cli, Commands};

pub use adapters::{NvidiaSmi, OllamaClient, ProviderRegistry};
pub use app::agents::ExampleAgent;
pub use app::ssh_setup::{KeyMaterial, SshKeyInstaller};
pub use config::{AgentSettings, AssistantConfig, Settings};
pub use core::{AgentRegistry, CodeAnalyzer, FallbackManager, Jarvis, ModelSelector, TaskRouter};
pub use utils::error::{JarvisError, Result};
