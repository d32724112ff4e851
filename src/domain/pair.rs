use serde::{Deserialize, Serialize};

/// A labelled (text, knowledge candidate) pair.
///
/// `group_id` identifies the dialogue turn the pair was cut from,
/// so validation predictions can be regrouped per turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgePair {
    pub group_id:  usize,
    pub text:      String,
    pub candidate: String,
    pub label:     usize,
}

impl KnowledgePair {
    pub fn new(
        group_id:  usize,
        text:      impl Into<String>,
        candidate: impl Into<String>,
        label:     usize,
    ) -> Self {
        Self {
            group_id,
            text:      text.into(),
            candidate: candidate.into(),
            label,
        }
    }

    pub fn is_positive(&self) -> bool {
        self.label == 1
    }
}
