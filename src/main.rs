//! labman: lab notebook workspace manager
//!
//! Creates, lists and archives lab directories and supervises a single
//! Jupyter Lab server for them.
//!
//! Usage:
//!   labman list                       # Labs, most recently modified first
//!   labman create my-lab              # Scaffold and seed a new lab
//!   labman delete my-lab              # Archive into <labs>/.recycle
//!   labman launch my-lab              # Start Jupyter Lab, open my-lab/data
//!   labman config set-lab-dir ~/labs  # Change the store root
//!   labman serve                      # JSON-RPC over stdin/stdout for a UI

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use labman_server::LabServer;
use labman_services::config::{ConfigStore, LabConfig, default_config_path, home_dir};
use labman_services::dialog::{Dialogs, HeadlessDialogs, TerminalDialogs};
use labman_services::opener::SystemOpener;
use labman_services::{LabError, LabManager, LabService, SupervisorConfig};
use tokio::io::BufReader;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "labman", about = "Lab notebook workspace manager")]
struct Cli {
    /// Config file (defaults to ~/.config/labman.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Notebook server executable
    #[arg(long, global = true, default_value = "jupyter-lab")]
    jupyter_bin: String,

    /// Enable verbose logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Write logs to a file (defaults to ~/.labman/logs/labman.log if no path given)
    #[arg(long, global = true, default_missing_value = "DEFAULT", num_args = 0..=1)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List labs, most recently modified first
    List,
    /// Create a lab and seed it from the templates
    Create { name: String },
    /// Move a lab into the archive
    Delete {
        name: String,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Open a lab directory in the file browser
    Explore { name: String },
    /// Open a lab's report document
    EditReport { name: String },
    /// Run Jupyter Lab until it exits or Ctrl+C is pressed
    Launch {
        /// Open the browser inside this lab's data directory
        lab: Option<String>,
    },
    /// Show or change the configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
    /// Serve JSON-RPC on stdin/stdout
    Serve,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    Show,
    /// Prompts when PATH is omitted
    SetLabDir { path: Option<PathBuf> },
    /// Prompts when PATH is omitted
    SetNotebookTemplate { path: Option<PathBuf> },
    /// Prompts when PATH is omitted
    SetReportTemplate { path: Option<PathBuf> },
}

fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    if let Some(ref log_file_arg) = cli.log_file {
        let log_path = if log_file_arg == "DEFAULT" {
            home_dir().join(".labman/logs/labman.log")
        } else {
            PathBuf::from(log_file_arg)
        };

        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating log dir {}", parent.display()))?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("opening log file {}", log_path.display()))?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();
    } else {
        // stdout carries command output and, under `serve`, the protocol
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    let dialogs: Arc<dyn Dialogs> = match cli.command {
        Command::Serve => Arc::new(HeadlessDialogs),
        _ => Arc::new(TerminalDialogs),
    };
    let supervisor_config = SupervisorConfig {
        program: cli.jupyter_bin.clone(),
        ..SupervisorConfig::default()
    };
    let config = ConfigStore::load(cli.config.clone().unwrap_or_else(default_config_path));
    let manager = Arc::new(LabManager::new(
        config,
        supervisor_config,
        Arc::new(SystemOpener),
        dialogs,
    ));

    match run(cli.command, &manager).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        // Already shown through the dialog boundary.
        Err(RunError::Lab(_)) => Ok(ExitCode::FAILURE),
        Err(RunError::Other(e)) => Err(e),
    }
}

enum RunError {
    Lab(LabError),
    Other(anyhow::Error),
}

impl From<LabError> for RunError {
    fn from(e: LabError) -> Self {
        Self::Lab(e)
    }
}

impl From<anyhow::Error> for RunError {
    fn from(e: anyhow::Error) -> Self {
        Self::Other(e)
    }
}

async fn run(command: Command, manager: &Arc<LabManager>) -> Result<(), RunError> {
    match command {
        Command::List => {
            for lab in manager.list_labs() {
                println!("{lab}");
            }
        }

        Command::Create { name } => {
            let path = manager.create_lab(&name)?;
            println!("{}", path.display());
        }

        Command::Delete { name, yes } => {
            let archived = if yes {
                Some(manager.archive_lab(&name)?)
            } else {
                manager.delete_lab(&name)?
            };
            match archived {
                Some(path) => println!("Archived to {}", path.display()),
                None => println!("Cancelled."),
            }
        }

        // Opener failures are not routed through the dialogs; let main print them.
        Command::Explore { name } => manager.explore_lab(&name).map_err(anyhow::Error::from)?,

        Command::EditReport { name } => manager.edit_report(&name).map_err(anyhow::Error::from)?,

        Command::Launch { lab } => launch(manager, lab.as_deref()).await?,

        Command::Config { action } => {
            let changed = match action {
                ConfigCommand::Show => Some(manager.config()),
                ConfigCommand::SetLabDir { path: Some(path) } => Some(manager.set_lab_dir(path)?),
                ConfigCommand::SetLabDir { path: None } => manager.change_lab_dir()?,
                ConfigCommand::SetNotebookTemplate { path: Some(path) } => {
                    Some(manager.set_notebook_template(path)?)
                }
                ConfigCommand::SetNotebookTemplate { path: None } => manager.change_notebook_template()?,
                ConfigCommand::SetReportTemplate { path: Some(path) } => {
                    Some(manager.set_report_template(path)?)
                }
                ConfigCommand::SetReportTemplate { path: None } => manager.change_report_template()?,
            };
            match changed {
                Some(config) => print_config(manager, &config)?,
                None => println!("Unchanged."),
            }
        }

        Command::Serve => serve(manager).await?,
    }
    Ok(())
}

fn print_config(manager: &LabManager, config: &LabConfig) -> anyhow::Result<()> {
    let yaml = serde_yaml::to_string(config).context("serializing config")?;
    println!("# {}", manager.config_path().display());
    print!("{yaml}");
    Ok(())
}

async fn launch(manager: &Arc<LabManager>, lab: Option<&str>) -> Result<(), LabError> {
    manager.launch(lab)?;
    let supervisor = manager.supervisor();
    eprintln!("Jupyter Lab started. Press Ctrl+C to stop.");

    tokio::select! {
        _ = supervisor.wait_stopped() => {}
        _ = tokio::signal::ctrl_c() => {
            eprintln!("Stopping Jupyter Lab...");
            manager.shutdown();
            supervisor.wait_stopped().await;
        }
    }
    info!("Jupyter Lab stopped");
    Ok(())
}

async fn serve(manager: &Arc<LabManager>) -> anyhow::Result<()> {
    let (notification_tx, _) = broadcast::channel::<String>(1024);

    let mut server = LabServer::new();
    server.set_notification_sender(notification_tx.clone());
    server.register_service(LabService::new(manager.clone()));
    server.attach_notifier(manager.notifier());
    let server = Arc::new(server);

    // Subscribe before initializing so the initial config/list events go out.
    let notifications = notification_tx.subscribe();
    server
        .initialize()
        .await
        .map_err(|e| anyhow::anyhow!("initializing server: {e}"))?;

    let stdin = BufReader::new(tokio::io::stdin());
    labman_server::serve(server.clone(), stdin, tokio::io::stdout(), notifications)
        .await
        .context("serving stdio")?;

    server.shutdown().await;
    if tokio::time::timeout(Duration::from_secs(5), manager.supervisor().wait_stopped())
        .await
        .is_err()
    {
        warn!("Notebook server did not stop within 5s");
    }
    Ok(())
}
