// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates one experiment run in order:
//
//   Step 1: Pick the experiment record and launch plan
//   Step 2: Choose the backend for accelerator + precision
//   Step 3: Seed every generator                (Layer 6 - infra)
//   Step 4: Resolve tokenizer + configuration   (Layer 6 - infra)
//   Step 5: Build and set up the data module    (Layer 4 - data)
//   Step 6: Build the classifier                (Layer 5 - ml)
//   Step 7: Start the run logger + checkpoints  (Layer 6 - infra)
//   Step 8: Fit, optionally resuming            (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use anyhow::{Context, Result};
use burn::{backend::Autodiff, tensor::backend::AutodiffBackend};
use std::path::{Path, PathBuf};

use crate::application::{
    experiment::{ExperimentConfig, LaunchPlan},
    hyperparameters::Hyperparameters,
};
use crate::data::{
    encoder::PairEncoder,
    module::{FocusDataModule, LoaderSettings},
};
use crate::infra::{
    checkpoint::ModelCheckpoint,
    hub::PretrainedStore,
    seed::seed_everything,
    tracking::ExperimentLogger,
};
use crate::ml::{
    classifier::KnowledgeClassifier,
    device::{Accelerator, CpuBackend, GpuBackend, GpuHalfBackend, Precision},
    trainer::{FitSummary, Trainer},
};

// ─── Training Configuration ──────────────────────────────────────────────────
// What the operator chose on the command line.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub experiment:     usize,
    pub debug:          bool,
    pub resume_from:    Option<PathBuf>,
    pub datasets_dir:   PathBuf,
    pub save_dir:       PathBuf,
    pub hub_cache_dir:  PathBuf,
    pub tokenizer_file: Option<PathBuf>,
    pub hub_offline:    bool,
    pub tracking_url:   Option<String>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            experiment:     1,
            debug:          false,
            resume_from:    None,
            datasets_dir:   PathBuf::from("./datasets/FoCus"),
            save_dir:       PathBuf::from("artifacts"),
            hub_cache_dir:  PathBuf::from("./hub-cache"),
            tokenizer_file: None,
            hub_offline:    false,
            tracking_url:   None,
        }
    }
}

impl TrainConfig {
    pub fn train_path(&self) -> PathBuf {
        self.datasets_dir.join("train_focus.json")
    }

    pub fn valid_path(&self) -> PathBuf {
        self.datasets_dir.join("valid_focus.json")
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<FitSummary> {
        let cfg = &self.config;

        // ── Step 1: Experiment record and launch plan ─────────────────────────
        let experiment = ExperimentConfig::by_id(cfg.experiment)?;
        let plan = experiment.plan(cfg.debug, &cfg.save_dir, cfg.resume_from.as_deref());
        let hp   = Hyperparameters::default().with_max_epochs(plan.max_epochs);

        tracing::info!(
            "Experiment {} ({}), debug={}, {} epoch(s) on {}",
            experiment.id,
            experiment.data_variant,
            cfg.debug,
            plan.max_epochs,
            plan.accelerator
        );

        // ── Step 2: Backend selection ─────────────────────────────────────────
        // The CPU backend always runs in single precision.
        match (plan.accelerator, hp.lightning.precision) {
            (Accelerator::Cpu, _) => {
                launch::<Autodiff<CpuBackend>>(cfg, &experiment, &plan, &hp)
            }
            (Accelerator::Gpu, Precision::Half) => {
                launch::<Autodiff<GpuHalfBackend>>(cfg, &experiment, &plan, &hp)
            }
            (Accelerator::Gpu, Precision::Full) => {
                launch::<Autodiff<GpuBackend>>(cfg, &experiment, &plan, &hp)
            }
        }
    }
}

fn launch<B: AutodiffBackend>(
    cfg:        &TrainConfig,
    experiment: &ExperimentConfig,
    plan:       &LaunchPlan,
    hp:         &Hyperparameters,
) -> Result<FitSummary> {
    let device: B::Device = Default::default();

    // ── Step 3: Seed ──────────────────────────────────────────────────────────
    let rng = seed_everything::<B>(hp.seed);

    // ── Step 4: Pretrained tokenizer and configuration ────────────────────────
    let store      = PretrainedStore::new(&cfg.hub_cache_dir, cfg.tokenizer_file.clone())
        .offline(cfg.hub_offline);
    let tokenizer  = store.tokenizer(&hp.model_name)?;
    let pretrained = store.config(&hp.model_name)?;

    // ── Step 5: Data module ───────────────────────────────────────────────────
    ensure_exists(&cfg.train_path())?;
    ensure_exists(&cfg.valid_path())?;
    let encoder = PairEncoder::new(tokenizer, hp.max_length)?;
    let settings = LoaderSettings {
        train_batch_size: hp.train_batch_size,
        valid_batch_size: hp.valid_batch_size,
        num_workers:      hp.lightning.num_workers,
        shuffle_seed:     hp.seed,
    };
    let mut datamodule = FocusDataModule::new(
        cfg.train_path(),
        cfg.valid_path(),
        experiment.data_variant,
        encoder,
        settings,
        cfg.debug,
    );
    datamodule.setup(rng)?;

    // ── Step 6: Model ─────────────────────────────────────────────────────────
    let model  = pretrained.classifier().init::<B>(&device);
    let module = KnowledgeClassifier::new(model, hp.learning_rate, hp.weight_decay);

    // ── Step 7: Run logger and checkpoint policy ──────────────────────────────
    let run_name = format!("experiment_{}", experiment.id);
    let logger = ExperimentLogger::new(
        &cfg.save_dir,
        &hp.project_name,
        &run_name,
        hp,
        cfg.tracking_url.as_deref(),
    )?;
    let checkpoint = ModelCheckpoint::new(
        logger.checkpoint_dir(),
        &format!("{}-{{epoch:02d}}-{{valid_loss:.2f}}", hp.model_name),
        "valid_loss",
    )?;

    // ── Step 8: Fit ───────────────────────────────────────────────────────────
    let mut trainer = Trainer::new(
        plan.accelerator,
        hp.lightning.precision,
        plan.max_epochs,
        hp.lightning.log_every_n_steps,
        checkpoint,
        logger,
        serde_json::to_value(hp)?,
    );
    trainer.fit(module, &datamodule, plan.resume_from.as_deref(), &device)
}

fn ensure_exists(path: &Path) -> Result<()> {
    std::fs::metadata(path)
        .map(|_| ())
        .with_context(|| format!("Dataset file '{}' not found", path.display()))
}
