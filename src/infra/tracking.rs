// ============================================================
// Layer 6 — Experiment Logger
// ============================================================
// Records one training run:
//
//   <save_dir>/<project>/<run_id>/
//     hyperparameters.json   the run's hyperparameter record
//     history.jsonl          every logged event, one per line
//     metrics.csv            epoch rows (see metrics.rs)
//     checkpoints/           written by the checkpoint policy
//
// When a tracking URL is configured every event is also POSTed
// there as JSON. Delivery problems are logged and otherwise
// ignored so a flaky tracking server never stops training.

use anyhow::{Context, Result};
use rand::{distributions::Alphanumeric, Rng};
use serde::Serialize;
use std::{
    collections::BTreeMap,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::infra::metrics::{EpochMetrics, MetricsLogger};

const RUN_ID_LEN: usize = 8;

/// Events in the run record, tagged by kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        project: String,
        run_id:  String,
        name:    String,
        config:  serde_json::Value,
    },
    Metrics {
        run_id: String,
        step:   usize,
        epoch:  usize,
        values: BTreeMap<String, f64>,
    },
    RunFinished {
        run_id: String,
        status: String,
    },
}

/// POSTs run events to a tracking endpoint.
struct RemoteSink {
    client: reqwest::blocking::Client,
    url:    String,
}

impl RemoteSink {
    fn send(&self, event: &RunEvent) {
        let result = self
            .client
            .post(&self.url)
            .json(event)
            .send()
            .and_then(|r| r.error_for_status());
        if let Err(e) = result {
            tracing::warn!("Tracking server '{}' rejected event: {}", self.url, e);
        }
    }
}

pub struct ExperimentLogger {
    run_id:  String,
    run_dir: PathBuf,
    history: PathBuf,
    csv:     MetricsLogger,
    remote:  Option<RemoteSink>,
}

impl ExperimentLogger {
    /// Start a run: create its directory, dump the hyperparameters
    /// and announce the run to the remote sink.
    pub fn new(
        save_dir:        &Path,
        project:         &str,
        name:            &str,
        hyperparameters: &impl Serialize,
        tracking_url:    Option<&str>,
    ) -> Result<Self> {
        let run_id  = new_run_id();
        let run_dir = save_dir.join(project).join(&run_id);
        fs::create_dir_all(&run_dir)
            .with_context(|| format!("Cannot create run directory '{}'", run_dir.display()))?;

        let config = serde_json::to_value(hyperparameters)?;
        let hp_path = run_dir.join("hyperparameters.json");
        fs::write(&hp_path, serde_json::to_string_pretty(&config)?)
            .with_context(|| format!("Cannot write '{}'", hp_path.display()))?;

        let remote = tracking_url.map(|url| RemoteSink {
            client: reqwest::blocking::Client::new(),
            url:    url.to_string(),
        });

        let logger = Self {
            csv:     MetricsLogger::new(&run_dir)?,
            history: run_dir.join("history.jsonl"),
            run_id,
            run_dir,
            remote,
        };

        logger.emit(&RunEvent::RunStarted {
            project: project.to_string(),
            run_id:  logger.run_id.clone(),
            name:    name.to_string(),
            config,
        })?;
        tracing::info!(
            "Run '{}' of project '{}' logging to '{}'",
            logger.run_id,
            project,
            logger.run_dir.display()
        );
        tracing::debug!("Epoch metrics go to '{}'", logger.csv.csv_path().display());
        Ok(logger)
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn checkpoint_dir(&self) -> PathBuf {
        self.run_dir.join("checkpoints")
    }

    pub fn log_metrics(&self, step: usize, epoch: usize, values: &[(&str, f64)]) -> Result<()> {
        self.emit(&RunEvent::Metrics {
            run_id: self.run_id.clone(),
            step,
            epoch,
            values: values.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        })
    }

    pub fn log_epoch(&self, metrics: &EpochMetrics) -> Result<()> {
        self.csv.log(metrics)?;
        self.log_metrics(metrics.global_step, metrics.epoch, &metrics.values())
    }

    pub fn finalize(&self, status: &str) -> Result<()> {
        self.emit(&RunEvent::RunFinished {
            run_id: self.run_id.clone(),
            status: status.to_string(),
        })
    }

    fn emit(&self, event: &RunEvent) -> Result<()> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.history)
            .with_context(|| format!("Cannot open '{}'", self.history.display()))?;
        writeln!(f, "{}", serde_json::to_string(event)?)?;

        if let Some(remote) = &self.remote {
            remote.send(event);
        }
        Ok(())
    }
}

/// Short lowercase alphanumeric id, e.g. "1is9z2lu".
fn new_run_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RUN_ID_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}
