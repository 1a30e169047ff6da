use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use warden_application::{EncounterOrchestrator, EncounterScheduler};
use warden_core::definition::DefinitionSource;
use warden_core::session::HistoryStore;
use warden_infrastructure::{ConfigService, JsonDefinitionSource, JsonlHistoryStore, WardenPaths};

mod logging;
mod repl;
mod sim;

use crate::repl::Shell;
use crate::sim::{LedgerRewardSink, SimulatedWorld};

#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Warden - timed multi-wave encounter orchestrator", long_about = None)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the orchestrator against a simulated world with an operator shell
    Run {
        /// Encounter definitions file, overrides the config
        #[arg(long)]
        definitions: Option<PathBuf>,

        /// History journal, overrides the config
        #[arg(long)]
        history: Option<PathBuf>,

        /// Only start encounters from the shell
        #[arg(long)]
        no_scheduler: bool,
    },
    /// Show recently finished encounters
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Only encounters of this definition
        #[arg(long)]
        definition: Option<String>,
    },
    /// Check a definitions file and report every rejected entry
    Validate { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_service = match cli.config {
        Some(path) => ConfigService::with_path(path),
        None => ConfigService::new()?,
    };
    let root = config_service
        .get_config()
        .with_context(|| format!("loading {}", config_service.path().display()))?;

    match cli.command {
        Commands::Run {
            definitions,
            history,
            no_scheduler,
        } => {
            let log_dir = WardenPaths::log_dir(&root.paths).ok();
            let _guard = logging::init(log_dir.as_deref());

            let definitions_path = match definitions {
                Some(path) => path,
                None => WardenPaths::definitions_file(&root.paths)?,
            };
            let history_path = match history {
                Some(path) => path,
                None => WardenPaths::history_file(&root.paths)?,
            };
            tracing::info!("[Bootstrap] Config: {}", config_service.path().display());
            tracing::info!("[Bootstrap] Definitions: {}", definitions_path.display());
            tracing::info!("[Bootstrap] History: {}", history_path.display());

            let world = Arc::new(SimulatedWorld::new());
            let rewards = Arc::new(LedgerRewardSink::new());
            let history: Arc<dyn HistoryStore> = Arc::new(JsonlHistoryStore::new(history_path));
            let orchestrator = EncounterOrchestrator::new(
                world.clone(),
                rewards.clone(),
                history,
                root.warden.clone(),
            );

            match orchestrator.recover_interrupted().await {
                Ok(recovered) if !recovered.is_empty() => tracing::warn!(
                    "[Bootstrap] Marked {} interrupted encounter(s) as failed",
                    recovered.len()
                ),
                Ok(_) => {}
                Err(e) => tracing::warn!("[Bootstrap] Interrupted-session recovery failed: {e}"),
            }

            let source: Arc<dyn DefinitionSource> = Arc::new(JsonDefinitionSource::new(
                definitions_path,
                root.warden.default_bonus_item_chance,
            ));
            match orchestrator.load_definitions(source.as_ref()).await {
                Ok(report) => tracing::info!(
                    "[Bootstrap] Loaded {} definition(s), rejected {}",
                    report.loaded,
                    report.rejected.len()
                ),
                Err(e) => tracing::warn!("[Bootstrap] No definitions loaded: {e}"),
            }

            if no_scheduler {
                tracing::info!("[Bootstrap] Scheduler disabled");
            } else {
                EncounterScheduler::new(orchestrator.clone()).spawn();
            }

            let printer = repl::spawn_event_printer(orchestrator.subscribe());
            let shell = Shell {
                orchestrator: orchestrator.clone(),
                world,
                rewards,
                source,
            };
            let outcome = shell.run().await;

            println!("{}", "Shutting down...".bright_black());
            orchestrator.shutdown().await;
            printer.abort();
            outcome?;
        }
        Commands::History { limit, definition } => {
            let path = WardenPaths::history_file(&root.paths)?;
            let store = JsonlHistoryStore::new(path);
            let records = match definition.as_deref() {
                Some(id) => store.query_by_definition(id, limit).await?,
                None => store.query_recent(limit).await?,
            };
            if records.is_empty() {
                println!("{}", "No finished encounters.".bright_black());
            }
            for record in records {
                println!("{}", record.summary_line());
            }
        }
        Commands::Validate { file } => {
            let source = JsonDefinitionSource::new(file, root.warden.default_bonus_item_chance);
            let batch = source.load().await?;
            for def in &batch.definitions {
                println!(
                    "{} {} '{}' ({} waves)",
                    "ok".green(),
                    def.id,
                    def.display_name,
                    def.total_waves()
                );
            }
            for rejected in &batch.rejected {
                println!("{} {}", "rejected".red(), rejected);
            }
            if !batch.rejected.is_empty() {
                anyhow::bail!("{} definition(s) rejected", batch.rejected.len());
            }
        }
    }

    Ok(())
}
