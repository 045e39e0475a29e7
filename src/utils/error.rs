use thiserror::Error;

#[derive(Error, Debug)]
pub enum JarvisError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Task '{task}' is not configured")]
    TaskNotConfigured { task: String },

    #[error("No models configured for task '{task}'")]
    NoModelsConfigured { task: String },

    #[error("No suitable models available for task type: {task_type}")]
    NoSuitableModel { task_type: String },

    #[error("Unknown model: {model}")]
    UnknownModel { model: String },

    #[error("{variable} is not configured")]
    MissingApiKey { variable: String },

    #[error("{provider} returned HTTP {status}: {message}")]
    ProviderError {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Invalid response from {provider}: {message}")]
    InvalidResponse { provider: String, message: String },

    #[error("Model {model} timed out after {seconds}s")]
    Timeout { model: String, seconds: u64 },

    #[error("Task '{task}' failed. All models in the chain failed after {attempts} attempts. Last error: {last_error}")]
    FallbackExhausted {
        task: String,
        attempts: usize,
        last_error: String,
    },

    #[error("Agent with name '{name}' is already registered")]
    AgentAlreadyRegistered { name: String },

    #[error("No agent found with name '{name}'. Available agents: {available}")]
    UnknownAgent { name: String, available: String },

    #[error("Failed to initialize agent '{agent}': {message}")]
    AgentInitializationError { agent: String, message: String },

    #[error("Agent '{agent}' failed: {message}")]
    AgentProcessingError { agent: String, message: String },

    #[error("Invalid key material in {source_name}: {reason}")]
    InvalidKeyMaterial { source_name: String, reason: String },

    #[error("Command '{command}' failed: {message}")]
    CommandError { command: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Provider,
    Routing,
    Agent,
    Filesystem,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl JarvisError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            JarvisError::HttpError(_) | JarvisError::Timeout { .. } => ErrorCategory::Network,
            JarvisError::IoError(_) | JarvisError::CommandError { .. } => ErrorCategory::Filesystem,
            JarvisError::SerializationError(_) | JarvisError::InvalidKeyMaterial { .. } => {
                ErrorCategory::Data
            }
            JarvisError::ConfigError { .. }
            | JarvisError::ConfigValidationError { .. }
            | JarvisError::InvalidConfigValueError { .. }
            | JarvisError::MissingConfigError { .. }
            | JarvisError::MissingApiKey { .. } => ErrorCategory::Configuration,
            JarvisError::ProviderError { .. }
            | JarvisError::InvalidResponse { .. }
            | JarvisError::FallbackExhausted { .. } => ErrorCategory::Provider,
            JarvisError::TaskNotConfigured { .. }
            | JarvisError::NoModelsConfigured { .. }
            | JarvisError::NoSuitableModel { .. }
            | JarvisError::UnknownModel { .. } => ErrorCategory::Routing,
            JarvisError::AgentAlreadyRegistered { .. }
            | JarvisError::UnknownAgent { .. }
            | JarvisError::AgentInitializationError { .. }
            | JarvisError::AgentProcessingError { .. } => ErrorCategory::Agent,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            JarvisError::Timeout { .. }
            | JarvisError::HttpError(_)
            | JarvisError::ProviderError { .. }
            | JarvisError::InvalidResponse { .. } => ErrorSeverity::Medium,
            JarvisError::NoSuitableModel { .. } | JarvisError::UnknownModel { .. } => {
                ErrorSeverity::Low
            }
            JarvisError::IoError(_) | JarvisError::CommandError { .. } => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            JarvisError::HttpError(_) => {
                "Check that the model server is reachable and the URL is correct".to_string()
            }
            JarvisError::Timeout { .. } => {
                "Increase fallback.timeout_seconds or use a smaller model".to_string()
            }
            JarvisError::MissingApiKey { variable } => {
                format!("Export {} or remove that provider from the model chain", variable)
            }
            JarvisError::ProviderError { provider, .. } => {
                format!("Inspect the {} service status and your account limits", provider)
            }
            JarvisError::FallbackExhausted { .. } => {
                "Make sure at least one model in the chain is installed or reachable (try `ollama list`)"
                    .to_string()
            }
            JarvisError::TaskNotConfigured { .. } | JarvisError::NoModelsConfigured { .. } => {
                "Add the task and its models to the [[tasks]] section of jarvis.toml".to_string()
            }
            JarvisError::NoSuitableModel { .. } => {
                "Pull a model that supports this task type with `ollama pull`".to_string()
            }
            JarvisError::ConfigError { .. }
            | JarvisError::ConfigValidationError { .. }
            | JarvisError::InvalidConfigValueError { .. }
            | JarvisError::MissingConfigError { .. } => {
                "Review jarvis.toml and the JARVIS_* environment variables".to_string()
            }
            JarvisError::InvalidKeyMaterial { .. } => {
                "Provide an OpenSSH private key and a single-line public key".to_string()
            }
            JarvisError::IoError(_) => "Check file permissions and available disk space".to_string(),
            _ => "Re-run with --verbose for more details".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Network => format!("Could not reach the model server: {}", self),
            ErrorCategory::Provider => format!("The AI models could not answer: {}", self),
            ErrorCategory::Routing => format!("Unable to route the request: {}", self),
            ErrorCategory::Agent => format!("Agent error: {}", self),
            ErrorCategory::Filesystem => format!("File system error: {}", self),
            ErrorCategory::Data => format!("Invalid data: {}", self),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, JarvisError>;
