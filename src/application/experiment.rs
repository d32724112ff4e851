// ============================================================
// Layer 2 — Experiment Table
// ============================================================
// The four experiments differ only in data, epoch count and
// whether they resume, so each one is a record rather than its
// own launcher:
//
//   id | variant | epochs | resumes
//   ---+---------+--------+--------------------------------
//    1 | V1      |   1    | no
//    2 | V2      |   1    | no
//    3 | V2      |   3    | yes (best checkpoint of run 1is9z2lu)
//    4 | V3      |   2    | no
//
// Debug mode trains one epoch on the CPU whatever the record says.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

use crate::data::sampler::DataVariant;
use crate::ml::device::Accelerator;

/// Checkpoint experiment 3 continues from, relative to the save directory.
pub const EXPERIMENT_3_RESUME: &str =
    "focus_knowledge_classification/1is9z2lu/checkpoints/microsoft/deberta-v3-base-epoch=00-valid_loss=0.53.ckpt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExperimentConfig {
    pub id:                usize,
    pub data_variant:      DataVariant,
    pub max_epochs:        usize,
    pub resume_checkpoint: Option<&'static str>,
}

const EXPERIMENTS: [ExperimentConfig; 4] = [
    ExperimentConfig { id: 1, data_variant: DataVariant::V1, max_epochs: 1, resume_checkpoint: None },
    ExperimentConfig { id: 2, data_variant: DataVariant::V2, max_epochs: 1, resume_checkpoint: None },
    ExperimentConfig { id: 3, data_variant: DataVariant::V2, max_epochs: 3, resume_checkpoint: Some(EXPERIMENT_3_RESUME) },
    ExperimentConfig { id: 4, data_variant: DataVariant::V3, max_epochs: 2, resume_checkpoint: None },
];

/// Everything that changes between a debug run and a full run.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchPlan {
    pub max_epochs:  usize,
    pub accelerator: Accelerator,
    pub resume_from: Option<PathBuf>,
}

impl ExperimentConfig {
    pub fn by_id(id: usize) -> Result<Self> {
        match EXPERIMENTS.iter().find(|e| e.id == id) {
            Some(e) => Ok(*e),
            None => bail!("Unknown experiment {id}; expected 1..={}", EXPERIMENTS.len()),
        }
    }

    pub fn all() -> &'static [ExperimentConfig] {
        &EXPERIMENTS
    }

    pub fn resumes(&self) -> bool {
        self.resume_checkpoint.is_some()
    }

    /// An override only applies to experiments that resume.
    pub fn plan(
        &self,
        debug:           bool,
        save_dir:        &Path,
        resume_override: Option<&Path>,
    ) -> LaunchPlan {
        let resume_from = self.resume_checkpoint.map(|rel| match resume_override {
            Some(path) => path.to_path_buf(),
            None       => save_dir.join(rel),
        });
        if resume_override.is_some() && !self.resumes() {
            tracing::warn!("Experiment {} does not resume; ignoring --resume-from", self.id);
        }

        if debug {
            LaunchPlan { max_epochs: 1, accelerator: Accelerator::Cpu, resume_from }
        } else {
            LaunchPlan { max_epochs: self.max_epochs, accelerator: Accelerator::Gpu, resume_from }
        }
    }

    /// Column titles matching `describe`.
    pub fn table_header() -> String {
        format_row("id", "variant", "balance", "epochs", "persona", "resume")
    }

    /// One row of the `experiments` table.
    pub fn describe(&self) -> String {
        let balance = if self.data_variant.balanced() { "balanced" } else { "all candidates" };
        let persona = if self.data_variant.persona_augmented() { "yes" } else { "no" };
        format_row(
            &self.id.to_string(),
            &self.data_variant.to_string(),
            balance,
            &self.max_epochs.to_string(),
            persona,
            self.resume_checkpoint.unwrap_or("-"),
        )
    }
}

fn format_row(id: &str, variant: &str, balance: &str, epochs: &str, persona: &str, resume: &str) -> String {
    format!("{id:<3} {variant:<8} {balance:<15} {epochs:<7} {persona:<8} {resume}")
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_runs_one_epoch_on_cpu() {
        for e in ExperimentConfig::all() {
            let plan = e.plan(true, Path::new("artifacts"), None);
            assert_eq!(plan.max_epochs, 1);
            assert_eq!(plan.accelerator, Accelerator::Cpu);
        }
    }

    #[test]
    fn test_full_runs_use_configured_epochs_on_gpu() {
        let epochs: Vec<usize> = ExperimentConfig::all()
            .iter()
            .map(|e| e.plan(false, Path::new("artifacts"), None))
            .inspect(|p| assert_eq!(p.accelerator, Accelerator::Gpu))
            .map(|p| p.max_epochs)
            .collect();
        assert_eq!(epochs, vec![1, 1, 3, 2]);
    }

    #[test]
    fn test_only_experiment_3_resumes() {
        for e in ExperimentConfig::all() {
            let plan = e.plan(false, Path::new("artifacts"), None);
            assert_eq!(plan.resume_from.is_some(), e.id == 3, "experiment {}", e.id);
        }
        let plan = ExperimentConfig::by_id(3).unwrap().plan(false, Path::new("artifacts"), None);
        assert_eq!(plan.resume_from, Some(Path::new("artifacts").join(EXPERIMENT_3_RESUME)));
    }

    #[test]
    fn test_resume_override() {
        let custom = Path::new("/tmp/run/best.ckpt");
        let e3 = ExperimentConfig::by_id(3).unwrap().plan(false, Path::new("artifacts"), Some(custom));
        assert_eq!(e3.resume_from.as_deref(), Some(custom));

        let e1 = ExperimentConfig::by_id(1).unwrap().plan(false, Path::new("artifacts"), Some(custom));
        assert_eq!(e1.resume_from, None);
    }

    #[test]
    fn test_variants_per_experiment() {
        let variants: Vec<DataVariant> =
            ExperimentConfig::all().iter().map(|e| e.data_variant).collect();
        assert_eq!(variants, vec![DataVariant::V1, DataVariant::V2, DataVariant::V2, DataVariant::V3]);
    }

    #[test]
    fn test_unknown_experiment() {
        assert!(ExperimentConfig::by_id(0).is_err());
        assert!(ExperimentConfig::by_id(5).is_err());
    }

    #[test]
    fn test_table_rows_line_up_with_header() {
        let header = ExperimentConfig::table_header();
        let resume_col = header.find("resume").unwrap();
        for e in ExperimentConfig::all() {
            let row = e.describe();
            assert_eq!(row.find(e.resume_checkpoint.unwrap_or("-")), Some(resume_col), "{row}");
            assert!(row.starts_with(&format!("{:<3} {:<8}", e.id, e.data_variant.to_string())));
        }
        assert!(ExperimentConfig::by_id(1).unwrap().describe().contains("all candidates"));
    }
}
