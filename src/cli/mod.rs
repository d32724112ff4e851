// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with clap.
// All work is delegated to Layer 2 (application).
//
//   1. `train`       — run one experiment
//   2. `experiments` — print the experiment table
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, TrainArgs};

use crate::application::experiment::ExperimentConfig;

#[derive(Parser, Debug)]
#[command(
    name = "focus-knowledge-classification",
    version,
    about = "Fine-tune a transformer to pick the gold knowledge sentence for FoCus dialogue turns."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Experiments => {
                run_experiments();
                Ok(())
            }
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Reading FoCus dialogues from: {}", args.datasets_dir.display());

    let summary = TrainUseCase::new(args.into()).execute()?;

    println!(
        "Run {} trained {} epoch(s), {} step(s) in total. Logs: {}",
        summary.run_id,
        summary.epochs_run,
        summary.global_step,
        summary.run_dir.display()
    );
    match (&summary.best_model_path, summary.best_model_score) {
        (Some(path), Some(score)) => {
            println!("Best checkpoint: {} (valid_loss={:.4})", path.display(), score)
        }
        _ => println!("No checkpoint written."),
    }
    Ok(())
}

fn run_experiments() {
    println!("{}", ExperimentConfig::table_header());
    for e in ExperimentConfig::all() {
        println!("{}", e.describe());
    }
}
