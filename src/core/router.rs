use crate::config::{AssistantConfig, TaskConfig};

/// Keyword router: maps a free-form prompt to a configured task.
#[derive(Debug, Clone)]
pub struct TaskRouter {
    tasks: Vec<RoutedTask>,
    default_task: String,
}

#[derive(Debug, Clone)]
struct RoutedTask {
    config: TaskConfig,
    keywords: Vec<String>,
}

impl TaskRouter {
    pub fn new(config: &AssistantConfig) -> Self {
        let tasks = config
            .tasks
            .iter()
            .map(|task| RoutedTask {
                keywords: task
                    .routing_keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect(),
                config: task.clone(),
            })
            .collect();

        Self {
            tasks,
            default_task: config.default_task().to_string(),
        }
    }

    /// First task, in configuration order, with a keyword contained in the
    /// prompt; otherwise the default task if it is defined.
    pub fn route(&self, prompt: &str) -> Option<&TaskConfig> {
        let prompt = prompt.to_lowercase();

        if let Some(task) = self
            .tasks
            .iter()
            .find(|t| t.keywords.iter().any(|k| prompt.contains(k.as_str())))
        {
            tracing::debug!("Routed prompt to '{}' by keyword", task.config.name);
            return Some(&task.config);
        }

        let fallback = self.task(&self.default_task);
        if fallback.is_none() {
            tracing::warn!("Default task '{}' is not configured", self.default_task);
        }
        fallback
    }

    pub fn task(&self, name: &str) -> Option<&TaskConfig> {
        self.tasks.iter().map(|t| &t.config).find(|t| t.name == name)
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.config.name.as_str()).collect()
    }

    pub fn default_task(&self) -> &str {
        &self.default_task
    }
}
