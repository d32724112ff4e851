// ============================================================
// Layer 6 — Checkpoint Policy and Storage
// ============================================================
// Keeps the single best checkpoint of a run, judged by the
// monitored validation metric, and reads one back to resume.
//
// Checkpoint names come from a template such as
//
//   microsoft/deberta-v3-base-{epoch:02d}-{valid_loss:.2f}
//
// where each `{name:fmt}` renders as `name=value`, giving
//
//   microsoft/deberta-v3-base-epoch=00-valid_loss=0.53
//
// A `/` in the model name becomes a subdirectory.
//
// Files written per checkpoint (all sharing the rendered stem):
//   <stem>.mpk.gz        model weights (Burn CompactRecorder)
//   <stem>.optim.mpk.gz  optimizer state
//   <stem>.json          epoch, step, monitored value, best score
//
// Burn's file recorders replace the path extension with their
// own, and rendered stems usually contain a '.' (the loss), so
// the recorder is always handed `<stem>.ckpt` / `<stem>.optim.ckpt`
// and left to swap the dummy extension.

use anyhow::{anyhow, bail, Context, Result};
use burn::{
    module::Module,
    optim::Optimizer,
    record::{CompactRecorder, Recorder},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use crate::ml::model::EncoderClassifier;

// ─── Filename template ────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Metric { name: String, format: ValueFormat },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ValueFormat {
    Plain,
    /// `0Nd`: integer, zero padded to N digits
    Integer { width: usize },
    /// `.Nf`: fixed point with N decimals
    Fixed { precision: usize },
}

impl ValueFormat {
    fn parse(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Ok(ValueFormat::Plain);
        }
        if let Some(digits) = pattern.strip_suffix('d') {
            let width = if digits.is_empty() { 0 } else { digits.parse()? };
            return Ok(ValueFormat::Integer { width });
        }
        if let Some(digits) = pattern.strip_prefix('.').and_then(|s| s.strip_suffix('f')) {
            return Ok(ValueFormat::Fixed { precision: digits.parse()? });
        }
        bail!("Unsupported format pattern '{pattern}'")
    }

    fn render(self, value: f64) -> String {
        match self {
            ValueFormat::Plain                => value.to_string(),
            ValueFormat::Integer { width }    => format!("{:0width$}", value.round() as i64),
            ValueFormat::Fixed { precision }  => format!("{value:.precision$}"),
        }
    }
}

/// A checkpoint filename template with `{name}` / `{name:fmt}`
/// placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct FilenameTemplate {
    segments: Vec<Segment>,
}

impl FilenameTemplate {
    pub fn parse(template: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut rest     = template;

        while let Some(open) = rest.find('{') {
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            let close = rest[open..]
                .find('}')
                .map(|i| open + i)
                .ok_or_else(|| anyhow!("Unclosed '{{' in template '{template}'"))?;

            let field = &rest[open + 1..close];
            let (name, pattern) = field.split_once(':').unwrap_or((field, ""));
            if name.is_empty() {
                bail!("Empty placeholder in template '{template}'");
            }
            segments.push(Segment::Metric {
                name:   name.to_string(),
                format: ValueFormat::parse(pattern)
                    .with_context(|| format!("In template '{template}'"))?,
            });
            rest = &rest[close + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }
        Ok(Self { segments })
    }

    /// Render with the given metric values; a missing metric
    /// renders as 0.
    pub fn render(&self, metrics: &BTreeMap<String, f64>) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.clone(),
                Segment::Metric { name, format } => {
                    let value = metrics.get(name).copied().unwrap_or(0.0);
                    format!("{name}={}", format.render(value))
                }
            })
            .collect()
    }
}

// ─── Checkpoint state ─────────────────────────────────────────────────────────
/// Written next to the weights so a run can be resumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointState {
    /// 0-based epoch that produced this checkpoint
    pub epoch:             usize,
    pub global_step:       usize,
    pub monitor:           String,
    pub monitor_value:     f64,
    pub best_model_score:  Option<f64>,
    pub dirpath:           PathBuf,
    pub hyper_parameters:  serde_json::Value,
}

/// The file set of one checkpoint, addressed by its stem.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointFiles {
    stem: PathBuf,
}

impl CheckpointFiles {
    const SUFFIXES: [&'static str; 5] = [".optim.mpk.gz", ".mpk.gz", ".optim.ckpt", ".ckpt", ".json"];

    pub fn new(stem: impl Into<PathBuf>) -> Self {
        Self { stem: stem.into() }
    }

    /// Accept any of the checkpoint's files (or the bare stem) and
    /// check that the checkpoint actually exists.
    pub fn resolve(path: &Path) -> Result<Self> {
        let raw  = path.to_string_lossy();
        let stem = Self::SUFFIXES
            .iter()
            .find_map(|suffix| raw.strip_suffix(suffix))
            .unwrap_or(raw.as_ref());
        let files = Self::new(stem);

        if !files.state_path().is_file() {
            bail!(
                "'{}' is not a checkpoint: missing '{}'",
                path.display(),
                files.state_path().display()
            );
        }
        Ok(files)
    }

    pub fn stem(&self) -> &Path {
        &self.stem
    }

    fn with_suffix(&self, suffix: &str) -> PathBuf {
        let mut s = self.stem.clone().into_os_string();
        s.push(suffix);
        PathBuf::from(s)
    }

    fn model_arg(&self) -> PathBuf {
        self.with_suffix(".ckpt")
    }

    fn optimizer_arg(&self) -> PathBuf {
        self.with_suffix(".optim.ckpt")
    }

    pub fn state_path(&self) -> PathBuf {
        self.with_suffix(".json")
    }

    pub fn write_state(&self, state: &CheckpointState) -> Result<()> {
        let path = self.state_path();
        fs::write(&path, serde_json::to_string_pretty(state)?)
            .with_context(|| format!("Cannot write '{}'", path.display()))
    }

    pub fn read_state(&self) -> Result<CheckpointState> {
        let path = self.state_path();
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed checkpoint state '{}'", path.display()))
    }

    /// Delete every file belonging to this checkpoint.
    pub fn remove(&self) -> Result<()> {
        let (Some(dir), Some(name)) = (self.stem.parent(), self.stem.file_name()) else {
            return Ok(());
        };
        let prefix = format!("{}.", name.to_string_lossy());

        for entry in fs::read_dir(dir).with_context(|| format!("Cannot read '{}'", dir.display()))? {
            let path = entry?.path();
            let matches = path
                .file_name()
                .map(|n| n.to_string_lossy().starts_with(&prefix))
                .unwrap_or(false);
            if matches {
                fs::remove_file(&path)
                    .with_context(|| format!("Cannot remove '{}'", path.display()))?;
            }
        }
        Ok(())
    }
}

// ─── Policy ───────────────────────────────────────────────────────────────────
/// Lower is better; a non-finite value never improves.
fn improves(candidate: f64, best: Option<f64>) -> bool {
    candidate.is_finite() && best.map_or(true, |b| candidate < b)
}

/// Saves a checkpoint whenever the monitored metric reaches a new
/// minimum and deletes the one it replaces, so at most one is kept.
#[derive(Debug)]
pub struct ModelCheckpoint {
    dirpath:          PathBuf,
    filename:         FilenameTemplate,
    monitor:          String,
    best_model_score: Option<f64>,
    best_model:       Option<CheckpointFiles>,
}

impl ModelCheckpoint {
    pub fn new(
        dirpath:  impl Into<PathBuf>,
        filename: &str,
        monitor:  impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            dirpath:          dirpath.into(),
            filename:         FilenameTemplate::parse(filename)?,
            monitor:          monitor.into(),
            best_model_score: None,
            best_model:       None,
        })
    }

    pub fn monitor(&self) -> &str {
        &self.monitor
    }

    pub fn best_model_score(&self) -> Option<f64> {
        self.best_model_score
    }

    pub fn best_model_path(&self) -> Option<&Path> {
        self.best_model.as_ref().map(CheckpointFiles::stem)
    }

    /// Restore the policy from a resumed checkpoint. The best
    /// score only carries over when the checkpoint was written to
    /// this same directory; otherwise the policy starts fresh.
    pub fn load_state(&mut self, state: &CheckpointState) {
        if state.dirpath == self.dirpath {
            self.best_model_score = state.best_model_score;
        } else {
            tracing::warn!(
                "Checkpoint directory changed from '{}' to '{}'; best score is not restored",
                state.dirpath.display(),
                self.dirpath.display()
            );
        }
    }

    /// Called after each validation run. `save` writes the weights
    /// for the given files; the state file is written here.
    /// Returns the new checkpoint when one was saved.
    pub fn on_validation_end<F>(
        &mut self,
        epoch:            usize,
        global_step:      usize,
        metrics:          &BTreeMap<String, f64>,
        hyper_parameters: &serde_json::Value,
        save:             F,
    ) -> Result<Option<CheckpointFiles>>
    where
        F: FnOnce(&CheckpointFiles) -> Result<()>,
    {
        let current = *metrics
            .get(&self.monitor)
            .ok_or_else(|| anyhow!("Monitored metric '{}' was not logged", self.monitor))?;

        if !improves(current, self.best_model_score) {
            tracing::info!(
                "Epoch {epoch}: {} = {current:.4} did not improve on {:.4}",
                self.monitor,
                self.best_model_score.unwrap_or(f64::NAN),
            );
            return Ok(None);
        }

        let mut values = metrics.clone();
        values.insert("epoch".to_string(), epoch as f64);
        values.insert("step".to_string(), global_step as f64);
        let files = CheckpointFiles::new(self.dirpath.join(self.filename.render(&values)));

        if let Some(parent) = files.stem().parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }

        save(&files)?;
        files.write_state(&CheckpointState {
            epoch,
            global_step,
            monitor:          self.monitor.clone(),
            monitor_value:    current,
            best_model_score: Some(current),
            dirpath:          self.dirpath.clone(),
            hyper_parameters: hyper_parameters.clone(),
        })?;

        if let Some(previous) = self.best_model.take() {
            if previous != files {
                previous.remove()?;
            }
        }
        tracing::info!(
            "Epoch {epoch}: {} reached {current:.4}, saved '{}'",
            self.monitor,
            files.stem().display()
        );

        self.best_model_score = Some(current);
        self.best_model       = Some(files.clone());
        Ok(Some(files))
    }
}

// ─── Burn records ─────────────────────────────────────────────────────────────
/// Write model and optimizer records for `files`.
pub fn save_records<B, O>(
    files: &CheckpointFiles,
    model: &EncoderClassifier<B>,
    optim: &O,
) -> Result<()>
where
    B: AutodiffBackend,
    O: Optimizer<EncoderClassifier<B>, B>,
{
    let recorder = CompactRecorder::new();

    Recorder::<B>::record(&recorder, model.clone().into_record(), files.model_arg())
        .with_context(|| format!("Failed to save model for '{}'", files.stem().display()))?;

    Recorder::<B>::record(&recorder, optim.to_record(), files.optimizer_arg())
        .with_context(|| format!("Failed to save optimizer for '{}'", files.stem().display()))?;

    Ok(())
}

/// Load a checkpoint into `model` and `optim`. The model must
/// have the architecture the checkpoint was written with.
pub fn load_records<B, O>(
    files:  &CheckpointFiles,
    model:  EncoderClassifier<B>,
    optim:  O,
    device: &B::Device,
) -> Result<(EncoderClassifier<B>, O, CheckpointState)>
where
    B: AutodiffBackend,
    O: Optimizer<EncoderClassifier<B>, B>,
{
    let state    = files.read_state()?;
    let recorder = CompactRecorder::new();

    let model_record = Recorder::<B>::load(&recorder, files.model_arg(), device)
        .with_context(|| format!("Cannot load model weights for '{}'", files.stem().display()))?;
    let optim_record = Recorder::<B>::load(&recorder, files.optimizer_arg(), device)
        .with_context(|| format!("Cannot load optimizer state for '{}'", files.stem().display()))?;

    Ok((model.load_record(model_record), optim.load_record(optim_record), state))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(valid_loss: f64) -> BTreeMap<String, f64> {
        BTreeMap::from([("valid_loss".to_string(), valid_loss)])
    }

    fn touch(files: &CheckpointFiles) -> Result<()> {
        fs::write(files.with_suffix(".mpk.gz"), b"weights")?;
        fs::write(files.with_suffix(".optim.mpk.gz"), b"optim")?;
        Ok(())
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_template_renders_name_value_pairs() {
        let template = FilenameTemplate::parse("x-{epoch:02d}-{valid_loss:.2f}").unwrap();
        let mut values = metrics(0.531);
        values.insert("epoch".to_string(), 2.0);
        assert_eq!(template.render(&values), "x-epoch=02-valid_loss=0.53");
    }

    #[test]
    fn test_template_with_model_directory() {
        let template = FilenameTemplate::parse(
            "microsoft/deberta-v3-base-{epoch:02d}-{valid_loss:.2f}"
        ).unwrap();
        let mut values = metrics(0.5349);
        values.insert("epoch".to_string(), 0.0);
        assert_eq!(
            template.render(&values),
            "microsoft/deberta-v3-base-epoch=00-valid_loss=0.53"
        );
    }

    #[test]
    fn test_template_missing_metric_renders_zero() {
        let template = FilenameTemplate::parse("{epoch}").unwrap();
        assert_eq!(template.render(&BTreeMap::new()), "epoch=0");
    }

    #[test]
    fn test_template_rejects_bad_specs() {
        assert!(FilenameTemplate::parse("x-{epoch:02x}").is_err());
        assert!(FilenameTemplate::parse("x-{epoch").is_err());
        assert!(FilenameTemplate::parse("x-{}").is_err());
    }

    #[test]
    fn test_keeps_only_best_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let mut policy = ModelCheckpoint::new(
            dir.path(), "m-{epoch:02d}-{valid_loss:.2f}", "valid_loss",
        ).unwrap();
        let hp = serde_json::json!({});

        let first = policy.on_validation_end(0, 10, &metrics(0.9), &hp, touch).unwrap();
        assert!(first.is_some());

        // Worse: nothing saved, first checkpoint survives.
        let worse = policy.on_validation_end(1, 20, &metrics(1.2), &hp, touch).unwrap();
        assert!(worse.is_none());
        assert_eq!(policy.best_model_score(), Some(0.9));

        // Better: replaces the first.
        let better = policy.on_validation_end(2, 30, &metrics(0.531), &hp, touch).unwrap();
        assert!(better.is_some());
        assert_eq!(
            files_in(dir.path()),
            vec![
                "m-epoch=02-valid_loss=0.53.json",
                "m-epoch=02-valid_loss=0.53.mpk.gz",
                "m-epoch=02-valid_loss=0.53.optim.mpk.gz",
            ]
        );

        let state = better.unwrap().read_state().unwrap();
        assert_eq!(state.epoch, 2);
        assert_eq!(state.global_step, 30);
        assert_eq!(state.best_model_score, Some(0.531));
    }

    #[test]
    fn test_nan_never_saved() {
        let dir = tempfile::tempdir().unwrap();
        let mut policy = ModelCheckpoint::new(
            dir.path(), "m-{epoch}", "valid_loss",
        ).unwrap();
        let saved = policy
            .on_validation_end(0, 1, &metrics(f64::NAN), &serde_json::json!({}), touch)
            .unwrap();
        assert!(saved.is_none());
    }

    #[test]
    fn test_missing_monitor_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut policy = ModelCheckpoint::new(
            dir.path(), "m-{epoch}", "valid_loss",
        ).unwrap();
        let result = policy.on_validation_end(0, 1, &BTreeMap::new(), &serde_json::json!({}), touch);
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_accepts_any_checkpoint_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut policy = ModelCheckpoint::new(
            dir.path(), "m-{epoch:02d}-{valid_loss:.2f}", "valid_loss",
        ).unwrap();
        let files = policy
            .on_validation_end(0, 5, &metrics(0.53), &serde_json::json!({}), touch)
            .unwrap()
            .unwrap();

        let stem = files.stem().to_path_buf();
        for candidate in [
            stem.clone(),
            files.with_suffix(".ckpt"),
            files.with_suffix(".mpk.gz"),
            files.with_suffix(".json"),
        ] {
            assert_eq!(CheckpointFiles::resolve(&candidate).unwrap().stem(), stem);
        }

        assert!(CheckpointFiles::resolve(&dir.path().join("nope.ckpt")).is_err());
    }

    #[test]
    fn test_state_restored_only_for_same_directory() {
        let dir = tempfile::tempdir().unwrap();
        let state = CheckpointState {
            epoch:            0,
            global_step:      100,
            monitor:          "valid_loss".to_string(),
            monitor_value:    0.53,
            best_model_score: Some(0.53),
            dirpath:          dir.path().to_path_buf(),
            hyper_parameters: serde_json::json!({}),
        };

        let mut same = ModelCheckpoint::new(dir.path(), "m", "valid_loss").unwrap();
        same.load_state(&state);
        assert_eq!(same.best_model_score(), Some(0.53));

        let mut other = ModelCheckpoint::new(dir.path().join("other"), "m", "valid_loss").unwrap();
        other.load_state(&state);
        assert_eq!(other.best_model_score(), None);
    }
}
