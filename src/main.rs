use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use kinetic_conductor::conductor::server;
use kinetic_conductor::conductor::types::PausedState;
use kinetic_conductor::conductor::{ConductorConfig, Orchestrator};

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Plan a request, ask for approval, then execute it
    Run {
        /// The request to orchestrate
        #[arg(short, long)]
        input: String,

        /// Path to a YAML config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Approve the plan without asking
        #[arg(short, long)]
        yes: bool,
    },
    /// Serve the HTTP API
    Serve {
        /// Port to listen on, overriding the configured bind address
        #[arg(short, long)]
        port: Option<u16>,

        /// Path to a YAML config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<ConductorConfig> {
    let config = match path {
        Some(path) => ConductorConfig::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ConductorConfig::from_env()?,
    };
    Ok(config)
}

fn print_plan(state: &PausedState) {
    println!("Strategy: {}", state.plan.overall_strategy);
    println!();
    for (i, (task, worker)) in state.plan.tasks.iter().zip(&state.workers).enumerate() {
        let deps = if task.dependencies.is_empty() {
            String::new()
        } else {
            format!(" (after {:?})", task.dependencies)
        };
        println!("  [{}] {}{} -> {} ({})", i, task.title, deps, worker.name, worker.model);
        println!("      {}", task.description);
    }
    if state.plan.tasks.len() != state.workers.len() {
        println!(
            "Warning: {} tasks but {} workers, execution will be refused",
            state.plan.tasks.len(),
            state.workers.len()
        );
    }
}

fn confirm() -> anyhow::Result<bool> {
    print!("Approve and execute? [y/N] ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Commands::Run { input, config, yes } => {
            let config = load_config(config)?;
            let orchestrator = Orchestrator::from_config(config)?;

            let execution = orchestrator.submit(input).await?;
            println!("Execution {}", execution.id);

            let state = orchestrator.run(&execution.id).await?;
            print_plan(&state);

            if !yes && !confirm()? {
                println!("Not approved; execution {} stays paused", execution.id);
                return Ok(());
            }

            let output = orchestrator.resume(&execution.id).await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Serve { port, config } => {
            let config = load_config(config)?;
            let mut addr = config.socket_addr()?;
            if let Some(port) = port {
                addr.set_port(port);
            }

            let orchestrator = Orchestrator::from_config(config)?;
            if let Err(e) = server::serve(orchestrator, addr).await {
                bail!("Server error: {}", e);
            }
        }
    }

    Ok(())
}
