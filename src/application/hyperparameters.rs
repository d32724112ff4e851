// ============================================================
// Layer 2 — Hyperparameter Record
// ============================================================
// One record per run. It is dumped to the run directory, sent to
// the run logger and stored in every checkpoint, so a checkpoint
// always says which settings produced it.

use serde::{Deserialize, Serialize};

use crate::ml::device::Precision;

/// Options for the training loop itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightningHyperparameters {
    pub precision:         Precision,
    pub max_epochs:        usize,
    pub log_every_n_steps: usize,
    pub num_workers:       usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub seed:             u64,
    pub train_batch_size: usize,
    pub valid_batch_size: usize,
    pub model_name:       String,
    pub max_length:       usize,
    pub learning_rate:    f64,
    pub weight_decay:     f32,
    pub project_name:     String,
    pub lightning:        LightningHyperparameters,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            seed:             2022,
            train_batch_size: 16,
            valid_batch_size: 16,
            model_name:       "microsoft/deberta-v3-base".to_string(),
            max_length:       256,
            learning_rate:    1e-5,
            weight_decay:     0.01,
            project_name:     "focus_knowledge_classification".to_string(),
            lightning: LightningHyperparameters {
                precision:         Precision::Half,
                max_epochs:        1,
                log_every_n_steps: 50,
                num_workers:       1,
            },
        }
    }
}

impl Hyperparameters {
    pub fn with_max_epochs(mut self, max_epochs: usize) -> Self {
        self.lightning.max_epochs = max_epochs;
        self
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let hp = Hyperparameters::default();
        assert_eq!(hp.seed, 2022);
        assert_eq!(hp.train_batch_size, 16);
        assert_eq!(hp.valid_batch_size, 16);
        assert_eq!(hp.model_name, "microsoft/deberta-v3-base");
        assert_eq!(hp.max_length, 256);
        assert_eq!(hp.lightning.precision, Precision::Half);
        assert_eq!(hp.lightning.num_workers, 1);
    }

    #[test]
    fn test_serialises_nested_lightning_options() {
        let hp   = Hyperparameters::default().with_max_epochs(3);
        let json = serde_json::to_value(&hp).unwrap();
        assert_eq!(json["lightning"]["max_epochs"], 3);
        assert_eq!(json["lightning"]["precision"], 16);
        assert_eq!(json["project_name"], "focus_knowledge_classification");
    }
}
