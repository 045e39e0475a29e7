use anyhow::Context;
use clap::Parser;
use jarvis::adapters::{NvidiaSmi, OllamaClient, ProviderRegistry};
use jarvis::app::ssh_setup::{self, KeyMaterial, SshKeyInstaller};
use jarvis::config::settings::load_dotenv;
use jarvis::config::{AgentSettings, AssistantConfig, Settings};
use jarvis::core::assistant::UNROUTED_RESPONSE;
use jarvis::core::selector::{default_catalog, ModelSelector};
use jarvis::core::{AgentRegistry, CodeAnalyzer, Jarvis};
use jarvis::domain::model::TaskType;
use jarvis::utils::error::ErrorSeverity;
use jarvis::utils::monitor::SystemMonitor;
use jarvis::utils::{logger, validation::Validate};
use jarvis::{Cli, Commands, JarvisError};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};

const STATUS_SAMPLE_INTERVAL: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = load_dotenv();
    let cli = Cli::parse();
    let settings = Settings::from_env();

    logger::init_cli_logger(
        cli.verbose || settings.debug,
        &settings.log_level,
        settings.log_file.as_deref(),
        cli.json_logs,
    );
    tracing::info!("Starting jarvis {}", env!("CARGO_PKG_VERSION"));
    match dotenv {
        Ok(Some(path)) => tracing::debug!("Loaded environment from {}", path.display()),
        Ok(None) => {}
        Err(e) => tracing::warn!("Ignoring .env file: {}", e),
    }

    if let Err(e) = run(cli, settings).await {
        match e.downcast_ref::<JarvisError>() {
            Some(err) => {
                tracing::error!(
                    "Command failed: {} (Category: {:?}, Severity: {:?})",
                    err,
                    err.category(),
                    err.severity()
                );
                eprintln!("❌ {}", err.user_friendly_message());
                eprintln!("💡 Suggestion: {}", err.recovery_suggestion());

                if err.severity() != ErrorSeverity::Low {
                    std::process::exit(err.exit_code());
                }
            }
            None => {
                tracing::error!("Command failed: {:#}", e);
                eprintln!("❌ {:#}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

async fn run(cli: Cli, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = settings.ensure_data_dir() {
        tracing::warn!("Could not create data directory {}: {}", settings.data_dir.display(), e);
    }

    match cli.command_or_default() {
        Commands::SetupSsh {
            private_key_file,
            public_key_file,
            dir,
            key_name,
        } => setup_ssh(private_key_file, public_key_file, dir, &key_name),
        Commands::Select { task_type } => {
            let config = load_config(&cli)?;
            select_model(&config, &task_type)
        }
        Commands::Models { refresh } => {
            let config = load_config(&cli)?;
            list_models(&config, &settings, refresh).await
        }
        Commands::Analyze { task, model, file } => {
            let config = load_config(&cli)?;
            analyze(&config, &settings, &task, model.as_deref(), file.as_deref()).await
        }
        Commands::Route { prompt } => {
            let config = load_config(&cli)?;
            let jarvis = build_assistant(&cli, &config, settings)?;
            route(&jarvis, &prompt.join(" "))
        }
        Commands::Ask { prompt } => {
            let config = load_config(&cli)?;
            let jarvis = build_assistant(&cli, &config, settings)?;
            println!("{}", jarvis.process_user_prompt(&prompt.join(" ")).await);
            Ok(())
        }
        Commands::Status { gpu_log } => {
            let config = load_config(&cli)?;
            let jarvis = build_assistant(&cli, &config, settings)?;
            status(&jarvis, &gpu_log).await
        }
        Commands::Chat => {
            let config = load_config(&cli)?;
            let mut jarvis = build_assistant(&cli, &config, settings)?;
            register_agents(&mut jarvis);
            chat(&mut jarvis, cli.verbose).await
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<AssistantConfig> {
    let config = AssistantConfig::load(cli.config.as_deref())?;
    config.validate()?;
    Ok(config)
}

fn request_timeout(config: &AssistantConfig) -> Duration {
    Duration::from_secs(config.fallback.timeout_seconds)
}

fn build_assistant(cli: &Cli, config: &AssistantConfig, settings: Settings) -> anyhow::Result<Jarvis> {
    let registry = ProviderRegistry::from_config(config, &settings, request_timeout(config))?;
    Ok(Jarvis::new(settings, config, registry).with_name(cli.name.clone()))
}

fn register_agents(jarvis: &mut Jarvis) {
    let registry = AgentRegistry::with_builtin_agents();
    for name in registry.names() {
        let agent_settings = AgentSettings::from_env(&name);
        if !agent_settings.enabled {
            tracing::info!("Agent '{}' disabled by configuration", name);
            continue;
        }
        let result = registry
            .create(&name, agent_settings.to_map())
            .and_then(|agent| jarvis.register_agent(agent));
        if let Err(e) = result {
            tracing::error!("Could not register agent '{}': {}", name, e);
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn chat(jarvis: &mut Jarvis, verbose: bool) -> anyhow::Result<()> {
    let monitor = SystemMonitor::new(verbose);
    jarvis.initialize_agents().await;

    println!("{}", jarvis.greet());
    println!("Type 'exit' or 'quit' to leave, '/status', '/health' or '/agents' to inspect.");
    jarvis.start_listening();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await.context("Failed to read from stdin")? else {
            println!();
            break;
        };
        let input = line.trim();

        match input {
            "" => continue,
            "exit" | "quit" => {
                println!("Goodbye!");
                break;
            }
            "/status" => print_json(&jarvis.status())?,
            "/health" => print_json(&jarvis.system_health())?,
            "/agents" => print_json(&jarvis.agent_statuses())?,
            prompt => {
                let answer = jarvis.process_user_prompt(prompt).await;
                println!("{}: {}", jarvis.name(), answer);
            }
        }
    }

    jarvis.stop_listening();
    jarvis.shutdown_agents().await;
    monitor.log_stats("chat session");
    Ok(())
}

fn route(jarvis: &Jarvis, prompt: &str) -> anyhow::Result<()> {
    match jarvis.route(prompt) {
        Some(task) => {
            println!("Task:  {}", task.name);
            if let Some(description) = &task.description {
                println!("About: {}", description);
            }
            println!("Chain: {}", task.models.join(" -> "));
        }
        None => println!("{}", UNROUTED_RESPONSE),
    }
    Ok(())
}

fn model_selector(config: &AssistantConfig) -> anyhow::Result<ModelSelector> {
    let mut catalog = config.model_catalog()?;
    if catalog.is_empty() {
        catalog = default_catalog();
    }
    Ok(ModelSelector::new(catalog, Some(Arc::new(NvidiaSmi::default()))))
}

async fn list_models(config: &AssistantConfig, settings: &Settings, refresh: bool) -> anyhow::Result<()> {
    let mut selector = model_selector(config)?;

    if refresh {
        let ollama = OllamaClient::new(&config.ollama_url(settings), request_timeout(config))?;
        if let Err(e) = selector.refresh_availability(&ollama).await {
            eprintln!("⚠️  Could not refresh availability from Ollama: {}", e);
        }
    }

    println!("{:<24} {:>8} {:>10} {:>10}  TASKS", "MODEL", "PRIORITY", "MEMORY MB", "AVAILABLE");
    for model in selector.models() {
        let tasks: Vec<&str> = model.task_types.iter().map(|t| t.as_str()).collect();
        println!(
            "{:<24} {:>8} {:>10} {:>10}  {}",
            model.name,
            model.priority,
            model.memory_requirement_mb,
            if model.is_available { "yes" } else { "no" },
            tasks.join(", ")
        );
    }
    println!("\nGPU memory: {} MB", selector.available_memory_mb());
    Ok(())
}

fn select_model(config: &AssistantConfig, task_type: &str) -> anyhow::Result<()> {
    let task_type: TaskType = task_type
        .parse()
        .map_err(|reason| JarvisError::InvalidConfigValueError {
            field: "task_type".to_string(),
            value: task_type.to_string(),
            reason,
        })?;

    let selector = model_selector(config)?;
    let model = selector.select(task_type)?;
    print_json(&serde_json::json!({
        "task_type": task_type,
        "model": model,
        "available_memory_mb": selector.available_memory_mb(),
    }))
}

async fn status(jarvis: &Jarvis, gpu_log: &Path) -> anyhow::Result<()> {
    let gpu_status = NvidiaSmi::default().log_status(gpu_log);

    let monitor = SystemMonitor::new(true);
    print_json(&serde_json::json!({
        "assistant": jarvis.status(),
        "tasks": jarvis.router().task_names(),
        "default_task": jarvis.router().default_task(),
        "gpu": gpu_status,
        "system": monitor.sample(STATUS_SAMPLE_INTERVAL).await,
    }))
}

async fn read_code(file: Option<&Path>) -> anyhow::Result<String> {
    match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut code = String::new();
            tokio::io::stdin()
                .read_to_string(&mut code)
                .await
                .context("Failed to read code from stdin")?;
            Ok(code)
        }
    }
}

async fn analyze(
    config: &AssistantConfig,
    settings: &Settings,
    task: &str,
    model: Option<&str>,
    file: Option<&Path>,
) -> anyhow::Result<()> {
    let code = read_code(file).await?;
    if code.trim().is_empty() {
        anyhow::bail!("No code provided");
    }

    let ollama = Arc::new(OllamaClient::new(&config.ollama_url(settings), request_timeout(config))?);
    let analyzer = CodeAnalyzer::new(ollama, model);
    println!("{}", analyzer.analyze(code.trim(), task).await?);
    Ok(())
}

fn setup_ssh(
    private_key_file: Option<PathBuf>,
    public_key_file: Option<PathBuf>,
    dir: Option<PathBuf>,
    key_name: &str,
) -> anyhow::Result<()> {
    let material = match (private_key_file, public_key_file) {
        (Some(private), Some(public)) => KeyMaterial::from_files(&private, &public)?,
        (None, None) => KeyMaterial::from_env()?,
        (Some(_), None) => {
            return Err(JarvisError::MissingConfigError {
                field: "--public-key-file".to_string(),
            }
            .into())
        }
        (None, Some(_)) => {
            return Err(JarvisError::MissingConfigError {
                field: "--private-key-file".to_string(),
            }
            .into())
        }
    };

    let dir = match dir {
        Some(dir) => dir,
        None => ssh_setup::default_ssh_dir()?,
    };

    let report = SshKeyInstaller::new(dir).with_key_name(key_name).install(&material)?;
    if report.created_dir {
        println!("📁 Created {}", report.dir.display());
    }
    println!("🔐 Private key: {}", report.private_key_path.display());
    println!("🔑 Public key:  {}", report.public_key_path.display());
    Ok(())
}
