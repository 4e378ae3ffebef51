//! Command-line interface for the orchestration relay.
//!
//! Provides commands for driving a pipeline run over either transport
//! and for probing the upstream orchestrator.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::adapters::{FallbackAdapter, StreamRelay, Transport};
use crate::config::RelayConfig;
use crate::core::{PipelineSession, RunObserver, TransportMode};
use crate::domain::run::RunState;
use crate::domain::stage::{Stage, StageStatus};
use crate::domain::wire::OrchestrateRequest;

/// edusphere - Orchestration relay and pipeline coordinator
#[derive(Parser, Debug)]
#[command(name = "edusphere")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the five-stage pipeline for a prompt
    Run {
        /// Natural-language instruction, e.g. "Create a 10 question quiz on Newton's Laws"
        prompt: String,

        /// Use the one-shot transport instead of the event stream
        #[arg(long)]
        sync: bool,

        /// Upstream orchestrator base URL
        #[arg(long, env = "EDUSPHERE_BACKEND_URL")]
        base_url: Option<String>,

        /// End-user token forwarded to the upstream
        #[arg(long)]
        token: Option<String>,
    },

    /// Probe the upstream orchestrator over both transports
    Health {
        /// Upstream orchestrator base URL
        #[arg(long, env = "EDUSPHERE_BACKEND_URL")]
        base_url: Option<String>,
    },
}

impl Cli {
    /// Execute the parsed command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run {
                prompt,
                sync,
                base_url,
                token,
            } => run_pipeline(prompt, sync, base_url, token).await,
            Commands::Health { base_url } => health(base_url).await,
        }
    }
}

fn resolve_config(base_url: Option<String>) -> RelayConfig {
    let config = RelayConfig::from_env();
    match base_url {
        Some(url) => config.with_base_url(url),
        None => config,
    }
}

async fn run_pipeline(
    prompt: String,
    sync: bool,
    base_url: Option<String>,
    token: Option<String>,
) -> Result<()> {
    let config = resolve_config(base_url);
    let mut session = PipelineSession::new(config)?;
    session.subscribe(Arc::new(TimelinePrinter::default()));

    let mode = if sync {
        TransportMode::Sync
    } else {
        TransportMode::Streaming
    };
    let request = OrchestrateRequest {
        prompt,
        user_token: token,
    };

    session.start_run_request(request, mode).await?;

    println!();
    if let Some(run) = session.current_run() {
        match &run.state {
            RunState::Completed => {
                if let Some(response) = run.response.as_ref() {
                    println!("{}", response.message);
                    if let Some(url) = response.form_url() {
                        println!("Form: {url}");
                    }
                    if let Some(count) = response.question_count() {
                        println!("Questions: {count}");
                    }
                }
                if let Some(total) = run.total_duration {
                    println!("Total: {total:.1}s");
                }
            }
            RunState::Failed { error } => {
                println!("Run failed: {error}");
            }
            RunState::Running => {}
        }
    }

    Ok(())
}

async fn health(base_url: Option<String>) -> Result<()> {
    let config = resolve_config(base_url);
    println!("Upstream: {}", config.base_url);

    let transports: Vec<Box<dyn Transport>> = vec![
        Box::new(StreamRelay::new(&config)?),
        Box::new(FallbackAdapter::new(&config)?),
    ];

    let mut healthy = true;
    for transport in &transports {
        match transport.health_check().await {
            Ok(()) => println!("  {} ... ok", transport.name()),
            Err(error) => {
                healthy = false;
                println!("  {} ... failed: {error:#}", transport.name());
            }
        }
    }

    if !healthy {
        anyhow::bail!("upstream orchestrator is not reachable");
    }
    Ok(())
}

/// Observer that prints each committed stage transition.
#[derive(Default)]
struct TimelinePrinter {
    seen: Mutex<Vec<(u64, usize, StageStatus)>>,
}

impl TimelinePrinter {
    fn print_stage(stage: &Stage) {
        match stage.status {
            StageStatus::Pending => {}
            StageStatus::Running => {
                println!("  > {} ... {}", stage.title, stage.subtitle);
            }
            StageStatus::Completed => {
                let duration = stage.duration.unwrap_or(0.0);
                println!("  ✓ {} ({duration:.1}s) {}", stage.title, stage.subtitle);
            }
            StageStatus::Error => {
                println!("  ✗ {} {}", stage.title, stage.subtitle);
            }
        }
    }
}

impl RunObserver for TimelinePrinter {
    fn stages_changed(&self, run_id: u64, stages: [Stage; 5]) {
        let Ok(mut seen) = self.seen.lock() else { return };
        for (index, stage) in stages.iter().enumerate() {
            let entry = (run_id, index, stage.status);
            if !seen.contains(&entry) {
                seen.push(entry);
                Self::print_stage(stage);
            }
        }
    }

    fn celebration(&self, _run_id: u64) {
        println!("  🎉 Quiz assigned to the classroom");
    }
}
