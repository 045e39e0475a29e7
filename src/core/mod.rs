pub mod agent;
pub mod assistant;
pub mod code_analyzer;
pub mod fallback;
pub mod metrics;
pub mod router;
pub mod selector;

pub use crate::domain::model::{ModelAttempt, ModelProfile, TaskType};
pub use crate::domain::ports::{Agent, MemoryProbe, ModelClient, ModelInventory};
pub use crate::utils::error::Result;
pub use agent::{AgentRegistry, AgentState};
pub use assistant::Jarvis;
pub use code_analyzer::CodeAnalyzer;
pub use fallback::{FallbackManager, FallbackOptions};
pub use metrics::ModelMetrics;
pub use router::TaskRouter;
pub use selector::ModelSelector;
