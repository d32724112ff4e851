// ============================================================
// Layer 5 — Trainer
// ============================================================
// Drives a KnowledgeClassifier through train + validation
// epochs with Burn's DataLoader and AdamW.
//
//   - Training uses the autodiff backend B
//   - model.valid() returns the model on B::InnerBackend, so
//     validation loaders are built for the inner backend too
//   - Epochs are 0-based; a resumed run continues with the epoch
//     after the one stored in the checkpoint
//   - train_loss is logged every `log_every_n_steps` optimizer
//     steps, epoch metrics after each validation
//
// Reference: Burn Book §5, Loshchilov & Hutter (2019) AdamW

use anyhow::Result;
use burn::{
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use crate::data::module::FocusDataModule;
use crate::infra::{
    checkpoint::{load_records, save_records, CheckpointFiles, ModelCheckpoint},
    metrics::EpochMetrics,
    tracking::ExperimentLogger,
};
use crate::ml::{
    classifier::{validation_step, KnowledgeClassifier, ValidationAccumulator},
    device::{Accelerator, Precision},
};

/// What a finished `fit` reports back.
#[derive(Debug, Clone)]
pub struct FitSummary {
    pub run_id:           String,
    pub run_dir:          PathBuf,
    pub epochs_run:       usize,
    pub global_step:      usize,
    pub best_model_path:  Option<PathBuf>,
    pub best_model_score: Option<f64>,
}

pub struct Trainer {
    accelerator:       Accelerator,
    precision:         Precision,
    max_epochs:        usize,
    log_every_n_steps: usize,
    checkpoint:        ModelCheckpoint,
    logger:            ExperimentLogger,
    hyper_parameters:  serde_json::Value,
}

impl Trainer {
    pub fn new(
        accelerator:       Accelerator,
        precision:         Precision,
        max_epochs:        usize,
        log_every_n_steps: usize,
        checkpoint:        ModelCheckpoint,
        logger:            ExperimentLogger,
        hyper_parameters:  serde_json::Value,
    ) -> Self {
        Self {
            accelerator,
            precision,
            max_epochs,
            log_every_n_steps: log_every_n_steps.max(1),
            checkpoint,
            logger,
            hyper_parameters,
        }
    }

    pub fn fit<B: AutodiffBackend>(
        &mut self,
        mut module: KnowledgeClassifier<B>,
        datamodule: &FocusDataModule,
        ckpt_path:  Option<&Path>,
        device:     &B::Device,
    ) -> Result<FitSummary> {
        let mut optim       = module.configure_optimizer();
        let mut start_epoch = 0usize;
        let mut global_step = 0usize;

        if let Some(path) = ckpt_path {
            let files = CheckpointFiles::resolve(path)?;
            let (model, restored, state) = load_records(&files, module.model, optim, device)?;
            module.model = model;
            optim        = restored;
            start_epoch  = state.epoch + 1;
            global_step  = state.global_step;
            self.checkpoint.load_state(&state);
            tracing::info!(
                "Resumed from '{}' (epoch {}, step {})",
                files.stem().display(),
                state.epoch,
                state.global_step
            );
        }

        tracing::info!(
            "Training {} on {} ({}-bit) for epochs {}..{}",
            datamodule.variant(),
            self.accelerator,
            self.precision,
            start_epoch,
            self.max_epochs
        );

        let train_loader = datamodule.train_dataloader::<B>(device);
        let valid_loader = datamodule.val_dataloader::<B::InnerBackend>(device);

        for epoch in start_epoch..self.max_epochs {
            // ── Training phase ────────────────────────────────────────────────
            let mut train_loss_sum = 0.0f64;
            let mut train_batches  = 0usize;

            for batch in train_loader.iter() {
                let loss = module.training_step(batch);
                let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
                train_loss_sum += loss_val;
                train_batches  += 1;

                let grads = GradientsParams::from_grads(loss.backward(), &module.model);
                module.model = optim.step(module.learning_rate(), module.model.clone(), grads);
                global_step += 1;

                if global_step % self.log_every_n_steps == 0 {
                    self.logger.log_metrics(global_step, epoch, &[("train_loss", loss_val)])?;
                }
            }

            let train_loss = if train_batches > 0 {
                train_loss_sum / train_batches as f64
            } else { f64::NAN };

            // ── Validation phase ──────────────────────────────────────────────
            // dropout disabled for deterministic evaluation
            let model_valid = module.model.valid();
            let mut acc     = ValidationAccumulator::default();
            for batch in valid_loader.iter() {
                acc.update(validation_step(&model_valid, batch)?);
            }
            let valid = acc.finish();

            let metrics = EpochMetrics {
                epoch,
                global_step,
                train_loss,
                valid_loss:              valid.valid_loss,
                valid_accuracy:          valid.valid_accuracy,
                valid_dialogue_accuracy: valid.valid_dialogue_accuracy,
            };

            println!(
                "Epoch {:>2}/{} | train_loss={:.4} | valid_loss={:.4} | valid_acc={:.1}% | dialogue_acc={:.1}%",
                epoch, self.max_epochs, metrics.train_loss, metrics.valid_loss,
                metrics.valid_accuracy * 100.0, metrics.valid_dialogue_accuracy * 100.0,
            );
            self.logger.log_epoch(&metrics)?;

            let monitored: BTreeMap<String, f64> = metrics
                .values()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect();
            let model = &module.model;
            let optim_ref = &optim;
            self.checkpoint.on_validation_end(
                epoch,
                global_step,
                &monitored,
                &self.hyper_parameters,
                |files| save_records(files, model, optim_ref),
            )?;
        }

        if start_epoch >= self.max_epochs {
            tracing::warn!(
                "Checkpoint already covers {} epochs; nothing left to train",
                self.max_epochs
            );
        }

        self.logger.finalize("finished")?;
        tracing::info!(
            "Training complete! Best {} = {:.4}",
            self.checkpoint.monitor(),
            self.checkpoint.best_model_score().unwrap_or(f64::NAN),
        );

        Ok(FitSummary {
            run_id:           self.logger.run_id().to_string(),
            run_dir:          self.logger.run_dir().to_path_buf(),
            epochs_run:       self.max_epochs.saturating_sub(start_epoch),
            global_step,
            best_model_path:  self.checkpoint.best_model_path().map(Path::to_path_buf),
            best_model_score: self.checkpoint.best_model_score(),
        })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{
        encoder::{fixtures::tiny_tokenizer, PairEncoder},
        module::{fixtures::write_split, LoaderSettings},
        sampler::DataVariant,
    };
    use crate::ml::model::PretrainedConfig;
    use burn::backend::{Autodiff, NdArray};
    use rand::{rngs::StdRng, SeedableRng};
    use serde_json::json;
    use std::fs;
    use tempfile::{NamedTempFile, TempDir};

    type TestBackend = Autodiff<NdArray>;

    /// Four dialogues with four candidates each: 16 V1 pairs, which
    /// is four optimizer steps per epoch at batch size 4.
    struct Setup {
        _train:     NamedTempFile,
        _valid:     NamedTempFile,
        datamodule: FocusDataModule,
        save_dir:   TempDir,
    }

    fn setup() -> Setup {
        let train = write_split(4, 4);
        let valid = write_split(2, 3);
        let mut datamodule = FocusDataModule::new(
            train.path(),
            valid.path(),
            DataVariant::V1,
            PairEncoder::new(tiny_tokenizer(), 16).unwrap(),
            LoaderSettings {
                train_batch_size: 4,
                valid_batch_size: 4,
                num_workers:      1,
                shuffle_seed:     2022,
            },
            false,
        );
        datamodule.setup(StdRng::seed_from_u64(2022)).unwrap();
        Setup { _train: train, _valid: valid, datamodule, save_dir: tempfile::tempdir().unwrap() }
    }

    fn classifier() -> KnowledgeClassifier<TestBackend> {
        let model = PretrainedConfig {
            vocab_size:              16,
            hidden_size:             8,
            num_hidden_layers:       1,
            num_attention_heads:     2,
            intermediate_size:       16,
            max_position_embeddings: 16,
            ..Default::default()
        }
        .classifier()
        .init::<TestBackend>(&Default::default());
        KnowledgeClassifier::new(model, 1e-3, 0.01)
    }

    /// Checkpoints go to the run's own directory unless `checkpoint_dir` is given.
    fn trainer(save_dir: &Path, checkpoint_dir: Option<PathBuf>, max_epochs: usize) -> Trainer {
        let logger = ExperimentLogger::new(save_dir, "proj", "test", &json!({}), None).unwrap();
        let dir = checkpoint_dir.unwrap_or_else(|| logger.checkpoint_dir());
        let checkpoint = ModelCheckpoint::new(dir, "m-{epoch:02d}-{valid_loss:.2f}", "valid_loss").unwrap();
        Trainer::new(Accelerator::Cpu, Precision::Full, max_epochs, 2, checkpoint, logger, json!({}))
    }

    fn with_suffix(stem: &Path, suffix: &str) -> PathBuf {
        let mut s = stem.as_os_str().to_owned();
        s.push(suffix);
        PathBuf::from(s)
    }

    #[test]
    fn test_fit_writes_best_checkpoint() {
        let s = setup();
        let summary = trainer(s.save_dir.path(), None, 1)
            .fit(classifier(), &s.datamodule, None, &Default::default())
            .unwrap();

        assert_eq!(summary.epochs_run, 1);
        assert_eq!(summary.global_step, 4);
        assert!(summary.best_model_score.unwrap().is_finite());

        let stem = summary.best_model_path.unwrap();
        assert!(stem.starts_with(summary.run_dir.join("checkpoints")));
        for suffix in [".mpk.gz", ".optim.mpk.gz", ".json"] {
            assert!(with_suffix(&stem, suffix).is_file(), "missing {suffix}");
        }

        let csv = fs::read_to_string(summary.run_dir.join("metrics.csv")).unwrap();
        assert_eq!(csv.lines().count(), 2);
    }

    #[test]
    fn test_resume_continues_after_saved_epoch() {
        let s = setup();
        let first = trainer(s.save_dir.path(), None, 1)
            .fit(classifier(), &s.datamodule, None, &Default::default())
            .unwrap();
        let ckpt = with_suffix(&first.best_model_path.unwrap(), ".ckpt");

        let resumed = trainer(s.save_dir.path(), None, 3)
            .fit(classifier(), &s.datamodule, Some(ckpt.as_path()), &Default::default())
            .unwrap();

        assert_ne!(resumed.run_id, first.run_id);
        assert_eq!(resumed.epochs_run, 2);
        assert_eq!(resumed.global_step, 12);

        let csv = fs::read_to_string(resumed.run_dir.join("metrics.csv")).unwrap();
        let epochs: Vec<&str> = csv
            .lines()
            .skip(1)
            .filter_map(|l| l.split(',').next())
            .collect();
        assert_eq!(epochs, vec!["1", "2"]);
    }

    #[test]
    fn test_resume_past_max_epochs_trains_nothing() {
        let s = setup();
        let first = trainer(s.save_dir.path(), None, 1)
            .fit(classifier(), &s.datamodule, None, &Default::default())
            .unwrap();
        let stem = first.best_model_path.unwrap();
        let checkpoint_dir = first.run_dir.join("checkpoints");

        // Same checkpoint directory, so the best score carries over.
        let resumed = trainer(s.save_dir.path(), Some(checkpoint_dir), 1)
            .fit(classifier(), &s.datamodule, Some(stem.as_path()), &Default::default())
            .unwrap();

        assert_eq!(resumed.epochs_run, 0);
        assert_eq!(resumed.global_step, 4);
        assert_eq!(resumed.best_model_score, first.best_model_score);
        assert!(with_suffix(&stem, ".mpk.gz").is_file());
    }

    #[test]
    fn test_resume_from_missing_checkpoint_fails() {
        let s = setup();
        let missing = s.save_dir.path().join("nope-epoch=00-valid_loss=0.53.ckpt");
        let result = trainer(s.save_dir.path(), None, 1)
            .fit(classifier(), &s.datamodule, Some(missing.as_path()), &Default::default());
        assert!(result.is_err());
    }
}
