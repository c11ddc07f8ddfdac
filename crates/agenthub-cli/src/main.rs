//! `agenthub`: inspect and drive an agent hub from the command line.

use agenthub_core::HubResult;
use agenthub_orchestrator::{AgentHub, HubConfig, Task, TaskExecutor, TaskOptions, TaskPriority};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "agenthub.toml";

#[derive(Parser)]
#[command(name = "agenthub", about = "Capability-based agent routing and delegation")]
struct Cli {
    /// Path to config file (defaults to ./agenthub.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print system status and per-agent status as JSON
    Status,
    /// Show which agent the configured strategy would pick
    Route {
        description: String,
        /// Only consider agents with this capability
        #[arg(long)]
        capability: Option<String>,
    },
    /// Run a task and print its result as JSON
    Delegate {
        description: String,
        /// Target agent; routed with the configured strategy when omitted
        #[arg(long)]
        agent: Option<String>,
        #[arg(long)]
        capability: Option<String>,
        #[arg(long, default_value = "medium")]
        priority: TaskPriority,
    },
}

/// Stand-in backend: answers with the task it was given.
struct EchoExecutor {
    agent_id: String,
}

#[async_trait]
impl TaskExecutor for EchoExecutor {
    async fn execute(&self, task: &Task) -> HubResult<String> {
        Ok(format!("[{}] {}", self.agent_id, task.description))
    }
}

async fn load_config(path: Option<&Path>) -> anyhow::Result<HubConfig> {
    match path {
        Some(path) => Ok(HubConfig::load(path).await?),
        None if Path::new(DEFAULT_CONFIG).exists() => Ok(HubConfig::load(DEFAULT_CONFIG).await?),
        None => Ok(HubConfig::default()),
    }
}

/// Build the hub and register every agent declared in the configuration.
fn build_hub(config: HubConfig) -> anyhow::Result<AgentHub> {
    let definitions = config.agents.clone();
    let hub = AgentHub::new(config)?;
    for definition in definitions {
        let executor = Arc::new(EchoExecutor {
            agent_id: definition.id.clone(),
        });
        let agent = hub.create_agent(definition, executor)?;
        hub.register_agent(agent)?;
    }
    Ok(hub)
}

fn init_tracing(config: &HubConfig, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_filter()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref()).await?;
    init_tracing(&config, cli.json_logs);

    let hub = build_hub(config)?;
    info!(
        agents = hub.agent_count(),
        strategy = %hub.strategy_name(),
        "Hub initialised"
    );
    if hub.agent_count() == 0 {
        warn!("No agents configured; add [[agents]] entries to {DEFAULT_CONFIG}");
    }

    match cli.command {
        Commands::Status => {
            let report = serde_json::json!({
                "strategy": hub.strategy_name(),
                "system": hub.get_system_status(),
                "agents": hub.get_all_agent_statuses(),
                "stats": hub.get_hub_stats(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Route {
            description,
            capability,
        } => {
            let chosen = hub
                .find_best_agent_for_task_async(&description, capability.as_deref())
                .await;
            match chosen {
                Some(agent) => println!("{}", agent.id()),
                None => println!("none"),
            }
        }
        Commands::Delegate {
            description,
            agent,
            capability,
            priority,
        } => {
            let mut options = TaskOptions::default().with_priority(priority);
            if let Some(capability) = capability {
                options = options.with_required_capability(capability);
            }
            let result = match agent {
                Some(agent_id) => hub.delegate_task(&agent_id, &description, options).await?,
                None => hub.smart_delegate_task(&description, options).await?,
            };
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
