use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Kinds of work a model can be selected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    CodeAnalysis,
    CodeGeneration,
    TextGeneration,
    ImageAnalysis,
    GeneralQa,
    Documentation,
    Debugging,
    Optimization,
}

impl TaskType {
    pub const ALL: [TaskType; 8] = [
        TaskType::CodeAnalysis,
        TaskType::CodeGeneration,
        TaskType::TextGeneration,
        TaskType::ImageAnalysis,
        TaskType::GeneralQa,
        TaskType::Documentation,
        TaskType::Debugging,
        TaskType::Optimization,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::CodeAnalysis => "code_analysis",
            TaskType::CodeGeneration => "code_generation",
            TaskType::TextGeneration => "text_generation",
            TaskType::ImageAnalysis => "image_analysis",
            TaskType::GeneralQa => "general_qa",
            TaskType::Documentation => "documentation",
            TaskType::Debugging => "debugging",
            TaskType::Optimization => "optimization",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        TaskType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| {
                let known: Vec<&str> = TaskType::ALL.iter().map(|t| t.as_str()).collect();
                format!("unknown task type '{}', expected one of: {}", s, known.join(", "))
            })
    }
}

/// A locally served model and what it is good for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProfile {
    pub name: String,
    pub task_types: Vec<TaskType>,
    pub priority: u32,
    pub memory_requirement_mb: u64,
    #[serde(default = "default_available")]
    pub is_available: bool,
}

fn default_available() -> bool {
    true
}

impl ModelProfile {
    pub fn new(name: &str, task_types: &[TaskType], priority: u32, memory_requirement_mb: u64) -> Self {
        Self {
            name: name.to_string(),
            task_types: task_types.to_vec(),
            priority,
            memory_requirement_mb,
            is_available: true,
        }
    }

    pub fn supports(&self, task_type: TaskType) -> bool {
        self.task_types.contains(&task_type)
    }
}

/// `provider/tag` split of a model chain entry, e.g. `ollama/llama3:8b`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef<'a> {
    pub provider: &'a str,
    pub tag: &'a str,
}

impl<'a> ModelRef<'a> {
    pub fn parse(model_name: &'a str) -> Option<Self> {
        let (provider, tag) = model_name.split_once('/')?;
        if provider.is_empty() || tag.is_empty() {
            return None;
        }
        Some(Self { provider, tag })
    }
}

/// Outcome of trying one model, possibly over several retries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelAttempt {
    pub model_name: String,
    pub success: bool,
    pub error: Option<String>,
    /// Seconds spent on this model including retries.
    pub duration: f64,
    pub retry_count: u32,
}

impl ModelAttempt {
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn from_success_rate(rate: f64) -> Self {
        if rate > 0.8 {
            HealthStatus::Healthy
        } else if rate > 0.5 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Unhealthy
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelHealth {
    pub success_rate: f64,
    pub total_attempts: u64,
    pub successful_attempts: u64,
    pub average_duration: f64,
    pub last_used: f64,
    pub status: HealthStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemHealth {
    pub models: BTreeMap<String, ModelHealth>,
    pub overall_health: HealthStatus,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentStatus {
    pub agent_name: String,
    pub status: String,
    pub last_updated: String,
    pub metrics: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_parsing_accepts_snake_and_kebab_case() {
        assert_eq!("code_analysis".parse::<TaskType>().unwrap(), TaskType::CodeAnalysis);
        assert_eq!("General-QA".parse::<TaskType>().unwrap(), TaskType::GeneralQa);
        assert!("teleportation".parse::<TaskType>().is_err());
    }

    #[test]
    fn test_task_type_serializes_like_enum_names() {
        let json = serde_json::to_string(&TaskType::ImageAnalysis).unwrap();
        assert_eq!(json, "\"IMAGE_ANALYSIS\"");
    }

    #[test]
    fn test_model_ref_splits_on_first_slash() {
        let r = ModelRef::parse("ollama/library/llama3:8b").unwrap();
        assert_eq!(r.provider, "ollama");
        assert_eq!(r.tag, "library/llama3:8b");
        assert!(ModelRef::parse("llama3:8b").is_none());
        assert!(ModelRef::parse("ollama/").is_none());
    }

    #[test]
    fn test_health_status_thresholds() {
        assert_eq!(HealthStatus::from_success_rate(1.0), HealthStatus::Healthy);
        assert_eq!(HealthStatus::from_success_rate(0.8), HealthStatus::Degraded);
        assert_eq!(HealthStatus::from_success_rate(0.51), HealthStatus::Degraded);
        assert_eq!(HealthStatus::from_success_rate(0.5), HealthStatus::Unhealthy);
    }
}
