// Concrete implementations of the domain ports: model providers and the GPU probe.

pub mod anthropic;
pub mod gpu;
pub mod http;
pub mod ollama;
pub mod openai;
pub mod registry;

pub use anthropic::AnthropicClient;
pub use gpu::{GpuStatus, NvidiaSmi};
pub use ollama::OllamaClient;
pub use openai::OpenAiCompatibleClient;
pub use registry::ProviderRegistry;
