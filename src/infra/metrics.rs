// ============================================================
// Layer 6 — Epoch Metrics CSV
// ============================================================
// Appends one row per epoch to <run_dir>/metrics.csv so learning
// curves can be plotted after the run.
//
// Example CSV output:
//   epoch,global_step,train_loss,valid_loss,valid_accuracy,valid_dialogue_accuracy
//   0,5120,0.412000,0.530000,0.781000,0.702000
//   1,10240,0.301000,0.498000,0.802000,0.731000

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

const HEADER: &str = "epoch,global_step,train_loss,valid_loss,valid_accuracy,valid_dialogue_accuracy";

/// One row of metrics for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// 0-based epoch number
    pub epoch: usize,

    /// Optimizer steps taken so far in the run
    pub global_step: usize,

    /// Mean cross-entropy over the epoch's training batches
    pub train_loss: f64,

    /// Batch-size weighted mean cross-entropy on validation
    pub valid_loss: f64,

    /// Fraction of validation pairs classified correctly
    pub valid_accuracy: f64,

    /// Fraction of dialogue turns whose top-scored pair is gold
    pub valid_dialogue_accuracy: f64,
}

impl EpochMetrics {
    /// Metric name/value pairs as sent to the run logger.
    pub fn values(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("train_loss_epoch",        self.train_loss),
            ("valid_loss",              self.valid_loss),
            ("valid_accuracy",          self.valid_accuracy),
            ("valid_dialogue_accuracy", self.valid_dialogue_accuracy),
        ]
    }
}

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row in the CSV.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;

        writeln!(
            f,
            "{},{},{:.6},{:.6},{:.6},{:.6}",
            m.epoch,
            m.global_step,
            m.train_loss,
            m.valid_loss,
            m.valid_accuracy,
            m.valid_dialogue_accuracy,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, valid_loss={:.4}",
            m.epoch,
            m.train_loss,
            m.valid_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
