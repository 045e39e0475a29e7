use crate::domain::model::{ModelProfile, TaskType};
use crate::domain::ports::{MemoryProbe, ModelInventory};
use crate::utils::error::{JarvisError, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Assumed GPU memory when no probe can report it.
pub const DEFAULT_MEMORY_MB: u64 = 6 * 1024;

#[derive(Debug, Clone, Serialize)]
pub struct SelectorStatus {
    pub gpu_available: bool,
    pub gpu_memory_mb: u64,
    pub models: Vec<ModelProfile>,
}

/// Picks a local model by capability, priority and GPU memory.
pub struct ModelSelector {
    models: Vec<ModelProfile>,
    probe: Option<Arc<dyn MemoryProbe>>,
}

impl ModelSelector {
    pub fn new(models: Vec<ModelProfile>, probe: Option<Arc<dyn MemoryProbe>>) -> Self {
        Self { models, probe }
    }

    pub fn with_default_catalog(probe: Option<Arc<dyn MemoryProbe>>) -> Self {
        Self::new(default_catalog(), probe)
    }

    pub fn probed_memory_mb(&self) -> Option<u64> {
        self.probe.as_ref().and_then(|p| p.total_memory_mb())
    }

    pub fn available_memory_mb(&self) -> u64 {
        self.probed_memory_mb().unwrap_or(DEFAULT_MEMORY_MB)
    }

    /// Best available model for `task_type`: lowest priority value, then
    /// smallest footprint, among those fitting in memory. If none fits the
    /// smallest candidate is returned.
    pub fn select(&self, task_type: TaskType) -> Result<&ModelProfile> {
        let mut candidates: Vec<&ModelProfile> = self
            .models
            .iter()
            .filter(|m| m.is_available && m.supports(task_type))
            .collect();

        if candidates.is_empty() {
            return Err(JarvisError::NoSuitableModel {
                task_type: task_type.to_string(),
            });
        }

        candidates.sort_by_key(|m| (m.priority, m.memory_requirement_mb));
        let memory = self.available_memory_mb();

        if let Some(model) = candidates
            .iter()
            .copied()
            .find(|m| m.memory_requirement_mb <= memory)
        {
            tracing::debug!("Selected {} for {} ({} MB available)", model.name, task_type, memory);
            return Ok(model);
        }

        let smallest = candidates
            .iter()
            .min_by_key(|m| m.memory_requirement_mb)
            .copied()
            .ok_or_else(|| JarvisError::NoSuitableModel {
                task_type: task_type.to_string(),
            })?;
        tracing::warn!(
            "No model for {} fits in {} MB, falling back to {} ({} MB)",
            task_type,
            memory,
            smallest.name,
            smallest.memory_requirement_mb
        );
        Ok(smallest)
    }

    /// Marks each model available iff the inventory lists it. An inventory
    /// failure leaves the flags unchanged.
    pub async fn refresh_availability(&mut self, inventory: &dyn ModelInventory) -> Result<()> {
        let installed: HashSet<String> = match inventory.installed_models().await {
            Ok(models) => models.into_iter().collect(),
            Err(e) => {
                tracing::error!("Error checking model availability: {}", e);
                return Err(e);
            }
        };

        for model in &mut self.models {
            model.is_available = installed.contains(&model.name);
            if !model.is_available {
                tracing::warn!("Model {} is not installed", model.name);
            }
        }
        Ok(())
    }

    pub fn model_info(&self, name: &str) -> Result<&ModelProfile> {
        self.models
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| JarvisError::UnknownModel {
                model: name.to_string(),
            })
    }

    pub fn models(&self) -> &[ModelProfile] {
        &self.models
    }

    pub fn system_status(&self) -> SelectorStatus {
        let probed = self.probed_memory_mb();
        SelectorStatus {
            gpu_available: probed.is_some(),
            gpu_memory_mb: probed.unwrap_or(DEFAULT_MEMORY_MB),
            models: self.models.clone(),
        }
    }
}

pub fn default_catalog() -> Vec<ModelProfile> {
    use TaskType::*;
    vec![
        ModelProfile::new(
            "codellama:7b-instruct",
            &[CodeAnalysis, CodeGeneration, Debugging, Optimization, Documentation],
            1,
            3800,
        ),
        ModelProfile::new("llama3:8b", &[TextGeneration, GeneralQa, Documentation], 2, 4700),
        ModelProfile::new("mistral:latest", &[TextGeneration, GeneralQa], 3, 4400),
        ModelProfile::new("llava:latest", &[ImageAnalysis], 4, 4700),
        ModelProfile::new("zephyr:7b-beta", &[TextGeneration, GeneralQa], 5, 4100),
        ModelProfile::new("gemma:2b", &[TextGeneration, GeneralQa], 6, 1700),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedMemory(Option<u64>);

    impl MemoryProbe for FixedMemory {
        fn total_memory_mb(&self) -> Option<u64> {
            self.0
        }
    }

    struct Installed(Vec<&'static str>);

    #[async_trait]
    impl ModelInventory for Installed {
        async fn installed_models(&self) -> Result<Vec<String>> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    struct Unreachable;

    #[async_trait]
    impl ModelInventory for Unreachable {
        async fn installed_models(&self) -> Result<Vec<String>> {
            Err(JarvisError::ConfigError {
                message: "connection refused".to_string(),
            })
        }
    }

    fn selector(memory: Option<u64>) -> ModelSelector {
        ModelSelector::with_default_catalog(Some(Arc::new(FixedMemory(memory))))
    }

    #[test]
    fn test_selects_by_priority() {
        let selector = selector(Some(8192));
        assert_eq!(selector.select(TaskType::CodeAnalysis).unwrap().name, "codellama:7b-instruct");
        assert_eq!(selector.select(TaskType::GeneralQa).unwrap().name, "llama3:8b");
        assert_eq!(selector.select(TaskType::ImageAnalysis).unwrap().name, "llava:latest");
    }

    #[test]
    fn test_skips_models_that_do_not_fit() {
        let selector = selector(Some(4500));
        assert_eq!(selector.select(TaskType::TextGeneration).unwrap().name, "mistral:latest");
    }

    #[test]
    fn test_falls_back_to_smallest_model() {
        let selector = selector(Some(1000));
        assert_eq!(selector.select(TaskType::TextGeneration).unwrap().name, "gemma:2b");
        assert_eq!(selector.select(TaskType::ImageAnalysis).unwrap().name, "llava:latest");
    }

    #[test]
    fn test_default_memory_without_probe() {
        let selector = ModelSelector::with_default_catalog(None);
        assert_eq!(selector.available_memory_mb(), DEFAULT_MEMORY_MB);

        let status = selector.system_status();
        assert!(!status.gpu_available);
        assert_eq!(status.gpu_memory_mb, 6144);
        assert_eq!(status.models.len(), 6);
    }

    #[test]
    fn test_model_info() {
        let selector = selector(None);
        assert_eq!(selector.model_info("gemma:2b").unwrap().priority, 6);
        assert!(matches!(
            selector.model_info("gpt-5"),
            Err(JarvisError::UnknownModel { .. })
        ));
    }

    #[tokio::test]
    async fn test_refresh_availability() {
        let mut selector = selector(Some(8192));
        selector
            .refresh_availability(&Installed(vec!["gemma:2b", "llava:latest"]))
            .await
            .unwrap();

        assert_eq!(selector.select(TaskType::GeneralQa).unwrap().name, "gemma:2b");
        assert!(matches!(
            selector.select(TaskType::CodeAnalysis),
            Err(JarvisError::NoSuitableModel { .. })
        ));
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_flags() {
        let mut selector = selector(Some(8192));
        assert!(selector.refresh_availability(&Unreachable).await.is_err());
        assert!(selector.models().iter().all(|m| m.is_available));
    }
}
