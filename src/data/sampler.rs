// ============================================================
// Layer 4 — Knowledge Pair Sampler
// ============================================================
// Turns FoCus dialogue turns into labelled (text, candidate)
// pairs. The three data module variants differ only here:
//
//   V1  every knowledge candidate becomes a pair
//       → N pairs per turn (1 positive, N-1 negative)
//
//   V2  the gold candidate plus one negative drawn uniformly
//       from the rest
//       → 2 pairs per turn (1 positive, 1 negative)
//
//   V3  as V2, with the persona sentences used for the reply
//       prepended to the user utterance
//
// The negative draw uses the run's seeded generator, so the same
// seed always yields the same pairs.

use rand::{rngs::StdRng, Rng};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::dialogue::{Dialogue, Turn};
use crate::domain::pair::KnowledgePair;

/// Which pair derivation a data module uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataVariant {
    V1,
    V2,
    V3,
}

impl DataVariant {
    /// True when positives and negatives are sampled 1:1.
    pub fn balanced(self) -> bool {
        !matches!(self, DataVariant::V1)
    }

    /// True when grounded persona sentences are added to the text.
    pub fn persona_augmented(self) -> bool {
        matches!(self, DataVariant::V3)
    }
}

impl fmt::Display for DataVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataVariant::V1 => "V1",
            DataVariant::V2 => "V2",
            DataVariant::V3 => "V3",
        };
        f.write_str(name)
    }
}

/// Derives labelled pairs from dialogues.
///
/// Group ids keep counting across calls, so pairs from the train
/// and validation splits never share a group.
pub struct PairSampler {
    variant:       DataVariant,
    rng:           StdRng,
    next_group_id: usize,
}

impl PairSampler {
    pub fn new(variant: DataVariant, rng: StdRng) -> Self {
        Self { variant, rng, next_group_id: 0 }
    }

    pub fn sample(&mut self, dialogues: &[Dialogue]) -> Vec<KnowledgePair> {
        let mut pairs   = Vec::new();
        let mut skipped = 0usize;

        for dialogue in dialogues {
            for turn in &dialogue.turns {
                let group_id = self.next_group_id;
                self.next_group_id += 1;

                match self.sample_turn(group_id, turn) {
                    Some(turn_pairs) => pairs.extend(turn_pairs),
                    None => skipped += 1,
                }
            }
        }

        if skipped > 0 {
            tracing::warn!(
                "Skipped {} turns without a usable utterance or gold knowledge index",
                skipped
            );
        }
        tracing::debug!(
            "Variant {} produced {} pairs ({} positive)",
            self.variant,
            pairs.len(),
            pairs.iter().filter(|p| p.is_positive()).count(),
        );
        pairs
    }

    fn sample_turn(&mut self, group_id: usize, turn: &Turn) -> Option<Vec<KnowledgePair>> {
        let gold      = turn.gold_index()?;
        let utterance = turn.last_user_utterance()?;

        let text = if self.variant.persona_augmented() {
            let persona = turn.grounded_persona();
            if persona.is_empty() {
                utterance
            } else {
                format!("{} {}", persona.join(" "), utterance)
            }
        } else {
            utterance
        };

        let candidates = &turn.knowledge_candidates;
        let pair = |i: usize| {
            KnowledgePair::new(group_id, text.clone(), candidates[i].clone(), usize::from(i == gold))
        };

        if !self.variant.balanced() {
            return Some((0..candidates.len()).map(pair).collect());
        }

        let mut out = vec![pair(gold)];
        if candidates.len() > 1 {
            // Uniform over every index except the gold one.
            let mut negative = self.rng.gen_range(0..candidates.len() - 1);
            if negative >= gold {
                negative += 1;
            }
            out.push(pair(negative));
        }
        Some(out)
    }
}
