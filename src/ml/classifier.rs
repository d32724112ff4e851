// ============================================================
// Layer 5 — Knowledge Classifier (training-loop adapter)
// ============================================================
// Wraps the base EncoderClassifier with what the trainer needs
// to drive it:
//
//   training_step    → loss for one batch (autodiff backend)
//   validation_step  → loss, correct count and per-pair scores
//                      (inner backend, no autodiff)
//   configure_optimizer → AdamW with the run's hyperparameters
//
// Validation scores are kept per pair so they can be regrouped
// by dialogue turn: a turn counts as correct when its gold pair
// has the highest positive probability among the turn's pairs.

use anyhow::{anyhow, ensure, Result};
use burn::{
    optim::{AdamWConfig, Optimizer},
    prelude::*,
    tensor::{activation::softmax, backend::AutodiffBackend, ElementConversion},
};
use std::collections::BTreeMap;

use crate::data::batcher::KnowledgeBatch;
use crate::ml::model::EncoderClassifier;

pub struct KnowledgeClassifier<B: AutodiffBackend> {
    pub model:     EncoderClassifier<B>,
    learning_rate: f64,
    weight_decay:  f32,
}

impl<B: AutodiffBackend> KnowledgeClassifier<B> {
    pub fn new(model: EncoderClassifier<B>, learning_rate: f64, weight_decay: f32) -> Self {
        Self { model, learning_rate, weight_decay }
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn training_step(&self, batch: KnowledgeBatch<B>) -> Tensor<B, 1> {
        let (loss, _) = self.model.forward_loss(
            batch.input_ids,
            batch.attention_mask,
            batch.labels,
        );
        loss
    }

    pub fn configure_optimizer(&self) -> impl Optimizer<EncoderClassifier<B>, B> {
        AdamWConfig::new()
            .with_weight_decay(self.weight_decay)
            .init::<B, EncoderClassifier<B>>()
    }
}

/// Positive-class probability of one validation pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPair {
    pub group_id:      usize,
    pub positive_prob: f32,
    pub label:         usize,
}

#[derive(Debug, Clone)]
pub struct ValidationStepOutput {
    pub loss:    f64,
    pub correct: usize,
    pub total:   usize,
    pub scored:  Vec<ScoredPair>,
}

pub fn validation_step<B: Backend>(
    model: &EncoderClassifier<B>,
    batch: KnowledgeBatch<B>,
) -> Result<ValidationStepOutput> {
    let total = batch.group_ids.len();
    let (loss, logits) = model.forward_loss(
        batch.input_ids,
        batch.attention_mask,
        batch.labels.clone(),
    );
    let loss: f64 = loss.into_scalar().elem::<f64>();

    // argmax(1) returns [batch, 1] — flatten before comparing with labels [batch]
    let predictions = logits.clone().argmax(1).flatten::<1>(0, 1);
    let correct: i64 = predictions
        .equal(batch.labels.clone())
        .int().sum().into_scalar().elem::<i64>();

    let [batch_size, num_labels] = logits.dims();
    let positive: Vec<f32> = softmax(logits, 1)
        .slice([0..batch_size, 1..num_labels])
        .into_data()
        .convert::<f32>()
        .to_vec()
        .map_err(|e| anyhow!("Cannot read validation probabilities: {e:?}"))?;
    let labels: Vec<i64> = batch
        .labels
        .into_data()
        .convert::<i64>()
        .to_vec()
        .map_err(|e| anyhow!("Cannot read validation labels: {e:?}"))?;
    ensure!(
        positive.len() == total && labels.len() == total,
        "Validation batch of {total} pairs produced {} scores and {} labels",
        positive.len(),
        labels.len()
    );

    let scored = batch
        .group_ids
        .iter()
        .zip(positive)
        .zip(labels)
        .map(|((&group_id, positive_prob), label)| ScoredPair {
            group_id,
            positive_prob,
            label: label as usize,
        })
        .collect();

    Ok(ValidationStepOutput { loss, correct: correct as usize, total, scored })
}

/// Epoch-level validation metrics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationMetrics {
    pub valid_loss:              f64,
    pub valid_accuracy:          f64,
    pub valid_dialogue_accuracy: f64,
}

/// Collects validation step outputs over one epoch.
#[derive(Debug, Default)]
pub struct ValidationAccumulator {
    weighted_loss: f64,
    correct:       usize,
    total:         usize,
    scored:        Vec<ScoredPair>,
}

impl ValidationAccumulator {
    pub fn update(&mut self, step: ValidationStepOutput) {
        self.weighted_loss += step.loss * step.total as f64;
        self.correct       += step.correct;
        self.total         += step.total;
        self.scored.extend(step.scored);
    }

    /// Loss is the batch-size weighted mean; NaN when nothing was seen.
    pub fn finish(self) -> ValidationMetrics {
        if self.total == 0 {
            return ValidationMetrics {
                valid_loss:              f64::NAN,
                valid_accuracy:          0.0,
                valid_dialogue_accuracy: 0.0,
            };
        }
        ValidationMetrics {
            valid_loss:              self.weighted_loss / self.total as f64,
            valid_accuracy:          self.correct as f64 / self.total as f64,
            valid_dialogue_accuracy: dialogue_accuracy(&self.scored),
        }
    }
}

/// Fraction of dialogue turns whose highest-scored pair is the
/// gold one. Ties go to the first pair seen.
pub fn dialogue_accuracy(scored: &[ScoredPair]) -> f64 {
    let mut best: BTreeMap<usize, &ScoredPair> = BTreeMap::new();
    for pair in scored {
        best.entry(pair.group_id)
            .and_modify(|current| {
                if pair.positive_prob > current.positive_prob {
                    *current = pair;
                }
            })
            .or_insert(pair);
    }

    if best.is_empty() {
        return 0.0;
    }
    let hits = best.values().filter(|p| p.label == 1).count();
    hits as f64 / best.len() as f64
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{batcher::KnowledgeBatcher, dataset::ClassificationItem};
    use crate::ml::model::PretrainedConfig;
    use burn::{backend::NdArray, data::dataloader::batcher::Batcher};

    fn scored(group_id: usize, positive_prob: f32, label: usize) -> ScoredPair {
        ScoredPair { group_id, positive_prob, label }
    }

    #[test]
    fn test_dialogue_accuracy_groups_by_turn() {
        let pairs = vec![
            // turn 0: gold ranked first → hit
            scored(0, 0.9, 1), scored(0, 0.2, 0), scored(0, 0.1, 0),
            // turn 1: a negative outranks gold → miss
            scored(1, 0.4, 1), scored(1, 0.6, 0),
        ];
        assert!((dialogue_accuracy(&pairs) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_dialogue_accuracy_empty() {
        assert_eq!(dialogue_accuracy(&[]), 0.0);
    }

    #[test]
    fn test_accumulator_weights_loss_by_batch_size() {
        let mut acc = ValidationAccumulator::default();
        acc.update(ValidationStepOutput {
            loss: 1.0, correct: 3, total: 3,
            scored: vec![scored(0, 0.8, 1), scored(0, 0.1, 0), scored(1, 0.7, 1)],
        });
        acc.update(ValidationStepOutput {
            loss: 0.0, correct: 0, total: 1,
            scored: vec![scored(1, 0.9, 0)],
        });

        let m = acc.finish();
        assert!((m.valid_loss - 0.75).abs() < 1e-9);
        assert!((m.valid_accuracy - 0.75).abs() < 1e-9);
        assert!((m.valid_dialogue_accuracy - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_validation_has_nan_loss() {
        assert!(ValidationAccumulator::default().finish().valid_loss.is_nan());
    }

    fn tiny_model(device: &<NdArray as Backend>::Device) -> EncoderClassifier<NdArray> {
        PretrainedConfig {
            vocab_size:              16,
            hidden_size:             8,
            num_hidden_layers:       1,
            num_attention_heads:     2,
            intermediate_size:       16,
            max_position_embeddings: 8,
            ..Default::default()
        }
        .classifier()
        .init::<NdArray>(device)
    }

    fn item(label: usize, group_id: usize) -> ClassificationItem {
        ClassificationItem {
            input_ids:      vec![1, 4, 2, 5, 2, 0],
            attention_mask: vec![1, 1, 1, 1, 1, 0],
            label,
            group_id,
        }
    }

    #[test]
    fn test_validation_step_scores_every_pair() {
        let device = Default::default();
        let model  = tiny_model(&device);
        let batch  = KnowledgeBatcher::<NdArray>::new(device)
            .batch(vec![item(1, 3), item(0, 3), item(1, 4)]);

        let out = validation_step(&model, batch).unwrap();
        assert_eq!(out.total, 3);
        assert!(out.correct <= 3);
        assert!(out.loss.is_finite());
        assert_eq!(out.scored.len(), 3);
        assert_eq!(out.scored[2].group_id, 4);
        assert!(out.scored.iter().all(|s| (0.0..=1.0).contains(&s.positive_prob)));
    }

    #[test]
    fn test_validation_step_rejects_unscored_pairs() {
        let device    = Default::default();
        let model     = tiny_model(&device);
        let mut batch = KnowledgeBatcher::<NdArray>::new(device)
            .batch(vec![item(1, 3), item(0, 3)]);
        // a group id without a matching row would drop out of dialogue accuracy
        batch.group_ids.push(9);

        let err = validation_step(&model, batch).unwrap_err();
        assert!(err.to_string().contains("3 pairs"));
    }
}
