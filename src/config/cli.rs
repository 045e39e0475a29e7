use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "jarvis")]
#[command(about = "Personal assistant routing prompts across local and hosted language models")]
#[command(version)]
pub struct Cli {
    /// Assistant configuration file (defaults to ./jarvis.toml)
    #[arg(long, env = "JARVIS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Overrides JARVIS_NAME
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long, short, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Interactive session (default)
    Chat,
    /// Answer a single prompt and exit
    Ask {
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
    },
    /// Show which task and model chain a prompt would use
    Route {
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
    },
    /// List the model catalog
    Models {
        /// Update availability from the Ollama server first
        #[arg(long)]
        refresh: bool,
    },
    /// Pick the best local model for a task type, e.g. code_analysis
    Select { task_type: String },
    /// Assistant, GPU and process status
    Status {
        /// JSON-lines file the GPU snapshot is appended to
        #[arg(long, value_name = "PATH", default_value = "gpu_usage.log")]
        gpu_log: PathBuf,
    },
    /// Run a code analysis task on a file, or stdin when no file is given
    Analyze {
        #[arg(long, default_value = "analyze")]
        task: String,
        #[arg(long)]
        model: Option<String>,
        file: Option<PathBuf>,
    },
    /// Install the SSH key pair used to reach a remote Ollama server
    SetupSsh {
        #[arg(long)]
        private_key_file: Option<PathBuf>,
        #[arg(long)]
        public_key_file: Option<PathBuf>,
        /// Target directory (defaults to ~/.ssh)
        #[arg(long)]
        dir: Option<PathBuf>,
        #[arg(long, default_value = "id_rsa")]
        key_name: String,
    },
}

impl Cli {
    pub fn command_or_default(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Chat)
    }
}
