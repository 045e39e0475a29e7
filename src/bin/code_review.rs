use clap::Parser;
use jarvis::adapters::{NvidiaSmi, OllamaClient};
use jarvis::config::settings::{load_dotenv, Settings};
use jarvis::core::code_analyzer::{AnalysisTask, CodeAnalyzer, DEFAULT_CODE_MODEL};
use jarvis::utils::logger;
use std::io::{IsTerminal, Read};
use std::sync::Arc;
use std::time::Duration;

const SAMPLE_CODE: &str = r#"fn fibonacci(n: u64) -> u64 {
    if n <= 1 {
        return n;
    }
    fibonacci(n - 1) + fibonacci(n - 2)
}"#;

#[derive(Debug, Parser)]
#[command(name = "code-review")]
#[command(about = "Explain, optimize and document code with a local Ollama model")]
struct Args {
    #[arg(long, default_value = DEFAULT_CODE_MODEL)]
    model: String,

    /// Overrides OLLAMA_URL
    #[arg(long)]
    ollama_url: Option<String>,

    #[arg(long, default_value = "120")]
    timeout_seconds: u64,

    #[arg(long, help = "Enable verbose output")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = load_dotenv();
    let args = Args::parse();
    let settings = Settings::from_env();
    logger::init_cli_logger(args.verbose, &settings.log_level, None, false);
    if let Err(e) = dotenv {
        tracing::warn!("Ignoring .env file: {}", e);
    }

    let url = args.ollama_url.clone().unwrap_or_else(|| settings.ollama_url.clone());
    let ollama = Arc::new(OllamaClient::new(&url, Duration::from_secs(args.timeout_seconds))?);
    let analyzer = CodeAnalyzer::new(ollama.clone(), Some(&args.model))
        .with_inventory(ollama)
        .with_gpu(NvidiaSmi::default());

    let info = analyzer.model_info().await;
    println!("=== System Information ===");
    println!("Current Model: {}", info.current_model);
    println!("Available Models: {}", info.available_models.join(", "));
    println!("GPU Available: {}", info.gpu_available);
    if info.gpu_available {
        println!("GPU Name: {}", info.gpu_name);
    }

    let mut code = String::new();
    if !std::io::stdin().is_terminal() {
        std::io::stdin().read_to_string(&mut code)?;
    }
    let code = if code.trim().is_empty() {
        println!("\nNo code provided. Using example code...");
        SAMPLE_CODE.to_string()
    } else {
        code.trim().to_string()
    };

    for task in [AnalysisTask::Explain, AnalysisTask::Optimize, AnalysisTask::Document] {
        println!("\n=== Code {} ===", task.as_str());
        match analyzer.analyze(&code, task.as_str()).await {
            Ok(answer) => println!("{}", answer),
            Err(e) => {
                tracing::error!("{} failed: {}", task.as_str(), e);
                eprintln!("❌ {}", e.user_friendly_message());
                eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
            }
        }
    }

    Ok(())
}
