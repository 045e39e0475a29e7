use crate::adapters::NvidiaSmi;
use crate::domain::ports::{ModelClient, ModelInventory};
use crate::utils::error::Result;
use serde::Serialize;
use std::sync::Arc;

pub const DEFAULT_CODE_MODEL: &str = "codellama:7b-instruct";

const FALLBACK_INSTRUCTION: &str = "Analyze this code:\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisTask {
    Analyze,
    Explain,
    Optimize,
    Debug,
    Document,
}

impl AnalysisTask {
    pub const ALL: [AnalysisTask; 5] = [
        AnalysisTask::Analyze,
        AnalysisTask::Explain,
        AnalysisTask::Optimize,
        AnalysisTask::Debug,
        AnalysisTask::Document,
    ];

    pub fn parse(task: &str) -> Option<Self> {
        match task.trim().to_lowercase().as_str() {
            "analyze" | "analyse" => Some(AnalysisTask::Analyze),
            "explain" => Some(AnalysisTask::Explain),
            "optimize" | "optimise" => Some(AnalysisTask::Optimize),
            "debug" => Some(AnalysisTask::Debug),
            "document" => Some(AnalysisTask::Document),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisTask::Analyze => "analyze",
            AnalysisTask::Explain => "explain",
            AnalysisTask::Optimize => "optimize",
            AnalysisTask::Debug => "debug",
            AnalysisTask::Document => "document",
        }
    }

    pub fn instruction(&self) -> &'static str {
        match self {
            AnalysisTask::Analyze => "Analyze the following code and provide insights:\n\n",
            AnalysisTask::Explain => "Explain how this code works:\n\n",
            AnalysisTask::Optimize => "Optimize the following code and explain the improvements:\n\n",
            AnalysisTask::Debug => "Find and fix any bugs in this code. Explain the issues and solutions:\n\n",
            AnalysisTask::Document => "Generate documentation for this code:\n\n",
        }
    }
}

/// Instruction-tuned prompt; unknown tasks get a generic instruction.
pub fn build_prompt(code: &str, task: &str) -> String {
    let instruction = AnalysisTask::parse(task)
        .map(|t| t.instruction())
        .unwrap_or(FALLBACK_INSTRUCTION);
    format!("[INST] {}{} [/INST]", instruction, code)
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzerInfo {
    pub current_model: String,
    pub available_models: Vec<String>,
    pub gpu_available: bool,
    pub gpu_name: String,
}

/// Sends code review prompts to a local code model.
pub struct CodeAnalyzer {
    client: Arc<dyn ModelClient>,
    inventory: Option<Arc<dyn ModelInventory>>,
    gpu: Option<NvidiaSmi>,
    model: String,
}

impl CodeAnalyzer {
    pub fn new(client: Arc<dyn ModelClient>, model: Option<&str>) -> Self {
        Self {
            client,
            inventory: None,
            gpu: None,
            model: model.unwrap_or(DEFAULT_CODE_MODEL).to_string(),
        }
    }

    pub fn with_inventory(mut self, inventory: Arc<dyn ModelInventory>) -> Self {
        self.inventory = Some(inventory);
        self
    }

    pub fn with_gpu(mut self, gpu: NvidiaSmi) -> Self {
        self.gpu = Some(gpu);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn analyze(&self, code: &str, task: &str) -> Result<String> {
        if AnalysisTask::parse(task).is_none() {
            tracing::warn!("Unknown analysis task '{}', using a generic instruction", task);
        }
        let prompt = build_prompt(code, task);
        tracing::info!("Running '{}' analysis with {}", task, self.model);

        let answer = self.client.generate(&self.model, &prompt).await?;
        Ok(answer.trim().to_string())
    }

    pub async fn model_info(&self) -> AnalyzerInfo {
        let available_models = match &self.inventory {
            Some(inventory) => inventory.installed_models().await.unwrap_or_else(|e| {
                tracing::warn!("Could not fetch available models: {}", e);
                Vec::new()
            }),
            None => Vec::new(),
        };

        let gpu = self.gpu.as_ref().and_then(|gpu| gpu.status().ok());

        AnalyzerInfo {
            current_model: self.model.clone(),
            available_models,
            gpu_available: gpu.is_some(),
            gpu_name: gpu.map(|g| g.name).unwrap_or_else(|| "No GPU".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        prompts: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ModelClient for Recorder {
        fn provider(&self) -> &str {
            "ollama"
        }

        async fn generate(&self, model_tag: &str, prompt: &str) -> Result<String> {
            self.prompts
                .lock()
                .unwrap()
                .push((model_tag.to_string(), prompt.to_string()));
            Ok("  looks fine  \n".to_string())
        }
    }

    #[async_trait]
    impl ModelInventory for Recorder {
        async fn installed_models(&self) -> Result<Vec<String>> {
            Ok(vec!["codellama:7b-instruct".to_string()])
        }
    }

    #[test]
    fn test_build_prompt() {
        assert_eq!(
            build_prompt("fn main() {}", "EXPLAIN"),
            "[INST] Explain how this code works:\n\nfn main() {} [/INST]"
        );
        assert_eq!(
            build_prompt("x = 1", "translate"),
            "[INST] Analyze this code:\n\nx = 1 [/INST]"
        );
    }

    #[test]
    fn test_task_names_round_trip() {
        for task in AnalysisTask::ALL {
            assert_eq!(AnalysisTask::parse(task.as_str()), Some(task));
        }
    }

    #[tokio::test]
    async fn test_analyze_uses_configured_model() {
        let recorder = Arc::new(Recorder::default());
        let analyzer = CodeAnalyzer::new(recorder.clone(), None);

        let answer = analyzer.analyze("def f(): pass", "debug").await.unwrap();

        assert_eq!(answer, "looks fine");
        let prompts = recorder.prompts.lock().unwrap();
        assert_eq!(prompts[0].0, "codellama:7b-instruct");
        assert!(prompts[0].1.starts_with("[INST] Find and fix any bugs"));
    }

    #[tokio::test]
    async fn test_model_info_without_gpu() {
        let recorder = Arc::new(Recorder::default());
        let analyzer = CodeAnalyzer::new(recorder.clone(), Some("deepseek-coder:6.7b"))
            .with_inventory(recorder)
            .with_gpu(NvidiaSmi::new("definitely-not-nvidia-smi"));

        let info = analyzer.model_info().await;

        assert_eq!(info.current_model, "deepseek-coder:6.7b");
        assert_eq!(info.available_models, vec!["codellama:7b-instruct"]);
        assert!(!info.gpu_available);
        assert_eq!(info.gpu_name, "No GPU");
    }
}
