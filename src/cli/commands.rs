// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Two subcommands: `train` runs one experiment, `experiments`
// lists what each experiment number means.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::train_use_case::TrainConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fine-tune the knowledge classifier for one experiment
    Train(TrainArgs),

    /// List the available experiments
    Experiments,
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Experiment number
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=4))]
    pub experiment: u8,

    /// 1 trains one epoch on the CPU with a handful of dialogues
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub debug_status: u8,

    /// Checkpoint to resume from (only experiments that resume use it)
    #[arg(long)]
    pub resume_from: Option<PathBuf>,

    /// Directory holding train_focus.json and valid_focus.json
    #[arg(long, default_value = "./datasets/FoCus")]
    pub datasets_dir: PathBuf,

    /// Where run directories and checkpoints are written
    #[arg(long, default_value = "artifacts")]
    pub save_dir: PathBuf,

    /// Cache directory for model hub downloads
    #[arg(long, default_value = "./hub-cache")]
    pub hub_cache_dir: PathBuf,

    /// Local tokenizer.json used instead of the hub download. Needed for
    /// models that only publish a SentencePiece spm.model (such as
    /// microsoft/deberta-v3-base): convert it to tokenizer.json first
    #[arg(long)]
    pub tokenizer_file: Option<PathBuf>,

    /// Never contact the model hub; resolve files from the cache only
    #[arg(long)]
    pub hub_offline: bool,

    /// Endpoint that receives run events as JSON
    #[arg(long, env = "FOCUS_TRACKING_URL")]
    pub tracking_url: Option<String>,
}

/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            experiment:     a.experiment as usize,
            debug:          a.debug_status == 1,
            resume_from:    a.resume_from,
            datasets_dir:   a.datasets_dir,
            save_dir:       a.save_dir,
            hub_cache_dir:  a.hub_cache_dir,
            tokenizer_file: a.tokenizer_file,
            hub_offline:    a.hub_offline,
            tracking_url:   a.tracking_url,
        }
    }
}
