use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use nullsweep::client::{check_endpoint, ChatClient};
use nullsweep::collaborators::Verifier as _;
use nullsweep::config::WorkflowConfig;
use nullsweep::engine::{EscalationEngine, StrategySet};
use nullsweep::feedback::{FileTuner, TrainingSession};
use nullsweep::focus::FocusProvider;
use nullsweep::strategy::{Strategy, StrategyKind, Summarizer};
use nullsweep::tools::{CheckerCli, SlicerCli};

#[derive(Parser)]
#[command(name = "nullsweep", about = "Escalating @Nullable annotation workflow")]
struct Cli {
    /// Path to a TOML config file; defaults come from the environment.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the escalation workflow over one source unit.
    Run {
        /// File containing the unit of problematic code.
        unit: PathBuf,
    },
    /// Run training passes over the currently outstanding findings.
    Train {
        /// Number of fix-and-record passes.
        #[arg(long, default_value_t = 1)]
        passes: u32,
    },
    /// Probe the configured endpoints and tools.
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = WorkflowConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Run { unit } => run_workflow(&config, &unit).await,
        Command::Train { passes } => run_training(&config, passes).await,
        Command::Doctor => run_doctor(&config).await,
    }
}

async fn run_workflow(config: &WorkflowConfig, unit_path: &std::path::Path) -> Result<()> {
    let unit = std::fs::read_to_string(unit_path)
        .with_context(|| format!("reading source unit {}", unit_path.display()))?;
    let engine = build_engine(config)?;

    let report = engine.run(&unit).await?;
    if !report.resolved {
        warn!("issues remain after the final level; manual review needed");
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_training(config: &WorkflowConfig, passes: u32) -> Result<()> {
    let retry = config.retry.policy();
    let mut session = TrainingSession::new(
        Arc::new(CheckerCli::new(&config.checker_cmd)),
        Arc::new(SlicerCli::new(&config.slicer_cmd)),
        Arc::new(FocusProvider::new(
            Arc::new(ChatClient::new(config.focus.clone())?),
            retry,
        )),
        Strategy::new(
            StrategyKind::Aggressive,
            Arc::new(ChatClient::new(config.aggressive.clone())?),
            retry,
        ),
        Arc::new(FileTuner::new(&config.training_corpus_path)),
    );

    for pass in 1..=passes {
        let recorded = session.train_once().await?;
        info!(pass, recorded, corpus = session.corpus().len(), "training pass done");
    }
    Ok(())
}

async fn run_doctor(config: &WorkflowConfig) -> Result<()> {
    for (name, endpoint) in [
        ("conservative", &config.conservative),
        ("deep", &config.deep),
        ("aggressive", &config.aggressive),
        ("focus", &config.focus),
    ] {
        let reachable = check_endpoint(&endpoint.url).await;
        info!(endpoint = name, url = %endpoint.url, reachable, "chat endpoint probe");
    }

    let checker = CheckerCli::new(&config.checker_cmd);
    match checker.reverify().await {
        Ok(()) => {
            let count = checker.enumerate_issues().await.map(|i| i.len()).unwrap_or(0);
            info!(findings = count, "checker runs and parses");
        }
        Err(e) => warn!(error = %e, "checker probe failed"),
    }
    Ok(())
}

fn build_engine(config: &WorkflowConfig) -> Result<EscalationEngine> {
    let retry = config.retry.policy();
    let focus_model: Arc<ChatClient> = Arc::new(ChatClient::new(config.focus.clone())?);

    Ok(EscalationEngine::new(
        Arc::new(CheckerCli::new(&config.checker_cmd)),
        Arc::new(SlicerCli::new(&config.slicer_cmd)),
        Arc::new(FocusProvider::new(focus_model.clone(), retry)),
        StrategySet {
            conservative: Strategy::new(
                StrategyKind::Conservative,
                Arc::new(ChatClient::new(config.conservative.clone())?),
                retry,
            ),
            semantic_deep: Strategy::new(
                StrategyKind::SemanticDeep,
                Arc::new(ChatClient::new(config.deep.clone())?),
                retry,
            ),
            aggressive: Strategy::new(
                StrategyKind::Aggressive,
                Arc::new(ChatClient::new(config.aggressive.clone())?),
                retry,
            ),
        },
        Summarizer::new(focus_model, retry),
        config.summary_threshold,
    ))
}
