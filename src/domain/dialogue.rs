// ============================================================
// Layer 3 — FoCus Dialogue Domain Types
// ============================================================
// A FoCus file is a JSON object with a single "data" array.
// Each entry is one dialogue between a user and the machine:
//
//   {
//     "dialogID": "...",
//     "persona":  ["I like castles.", ...],
//     "utterance": [
//       {
//         "dialogue1":            ["user q", "machine a"],
//         "persona_candidate":    [...],
//         "persona_grounding":    [false, true, ...],
//         "knowledge_candidates": [...],
//         "knowledge_answer_index": 3
//       },
//       { "dialogue2": [...4 entries...], ... }
//     ]
//   }
//
// The history key changes with every turn ("dialogue1",
// "dialogue2", ...), so it is captured through a flattened map
// and looked up by prefix.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Top-level shape of `train_focus.json` / `valid_focus.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FocusCorpus {
    pub data: Vec<Dialogue>,
}

/// One dialogue with all of its turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dialogue {
    #[serde(rename = "dialogID")]
    pub dialog_id: String,

    #[serde(default)]
    pub persona: Vec<String>,

    #[serde(rename = "utterance", default)]
    pub turns: Vec<Turn>,
}

/// One turn of a dialogue: the history up to this point plus the
/// persona and knowledge candidates that could ground the reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    #[serde(default)]
    pub persona_candidate: Vec<String>,

    /// Parallel to `persona_candidate`: true when that persona
    /// sentence was used to write the reply
    #[serde(default)]
    pub persona_grounding: Vec<bool>,

    #[serde(default)]
    pub knowledge_candidates: Vec<String>,

    /// Index of the gold sentence in `knowledge_candidates`
    pub knowledge_answer_index: i64,

    /// Everything else, including the `dialogueN` history
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Turn {
    /// The dialogue history of this turn, read from the `dialogueN`
    /// key with the highest N.
    pub fn history(&self) -> Vec<String> {
        self.extra
            .iter()
            .filter_map(|(key, value)| {
                let n: usize = key.strip_prefix("dialogue")?.parse().ok()?;
                Some((n, value))
            })
            .max_by_key(|(n, _)| *n)
            .and_then(|(_, value)| value.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The most recent user utterance.
    ///
    /// User turns sit at even indices of the history. A complete
    /// turn ends with the machine reply, so the last user line is
    /// the second to last entry; an incomplete one ends with it.
    pub fn last_user_utterance(&self) -> Option<String> {
        let history = self.history();
        let index = match history.len() {
            0 => return None,
            n if n % 2 == 0 => n - 2,
            n => n - 1,
        };
        history.into_iter().nth(index)
    }

    /// Gold knowledge index, or None when it does not point at a
    /// candidate.
    pub fn gold_index(&self) -> Option<usize> {
        usize::try_from(self.knowledge_answer_index)
            .ok()
            .filter(|&i| i < self.knowledge_candidates.len())
    }

    /// Persona sentences that were used to write the reply.
    pub fn grounded_persona(&self) -> Vec<&str> {
        self.persona_candidate
            .iter()
            .zip(self.persona_grounding.iter())
            .filter(|(_, used)| **used)
            .map(|(sentence, _)| sentence.as_str())
            .collect()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn turn(value: Value) -> Turn {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_history_uses_highest_dialogue_key() {
        let t = turn(json!({
            "dialogue1": ["old"],
            "dialogue3": ["q1", "a1", "q2", "a2", "q3", "a3"],
            "knowledge_answer_index": 0
        }));
        assert_eq!(t.history().len(), 6);
        assert_eq!(t.last_user_utterance().as_deref(), Some("q3"));
    }

    #[test]
    fn test_last_user_utterance_without_reply() {
        let t = turn(json!({
            "dialogue2": ["q1", "a1", "q2"],
            "knowledge_answer_index": 0
        }));
        assert_eq!(t.last_user_utterance().as_deref(), Some("q2"));
    }

    #[test]
    fn test_missing_history() {
        let t = turn(json!({ "knowledge_answer_index": 0 }));
        assert!(t.history().is_empty());
        assert!(t.last_user_utterance().is_none());
    }

    #[test]
    fn test_gold_index_bounds() {
        let t = turn(json!({
            "knowledge_candidates": ["a", "b"],
            "knowledge_answer_index": 1
        }));
        assert_eq!(t.gold_index(), Some(1));

        let t = turn(json!({
            "knowledge_candidates": ["a", "b"],
            "knowledge_answer_index": 2
        }));
        assert_eq!(t.gold_index(), None);

        let t = turn(json!({
            "knowledge_candidates": ["a"],
            "knowledge_answer_index": -1
        }));
        assert_eq!(t.gold_index(), None);
    }

    #[test]
    fn test_grounded_persona() {
        let t = turn(json!({
            "persona_candidate": ["p0", "p1", "p2"],
            "persona_grounding": [false, true, true],
            "knowledge_answer_index": 0
        }));
        assert_eq!(t.grounded_persona(), vec!["p1", "p2"]);
    }
}
