// ============================================================
// Layer 4 — FoCus Loader
// ============================================================
// Reads a FoCus JSON file into domain dialogues.
//
// A missing or malformed file is fatal: the run cannot produce
// anything meaningful without its data, so the error is returned
// with the path attached and the launcher aborts.

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};

use crate::domain::dialogue::{Dialogue, FocusCorpus};
use crate::domain::traits::DialogueSource;

/// Loads every dialogue from one FoCus split file.
pub struct FocusLoader {
    path: PathBuf,
}

impl FocusLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DialogueSource for FocusLoader {
    fn load_all(&self) -> Result<Vec<Dialogue>> {
        let json = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read dataset '{}'", self.path.display()))?;

        let dialogues = parse_corpus(&json)
            .with_context(|| format!("Malformed FoCus file '{}'", self.path.display()))?;

        tracing::info!(
            "Loaded {} dialogues from '{}'",
            dialogues.len(),
            self.path.display()
        );
        Ok(dialogues)
    }
}

/// Parse the contents of a FoCus file.
pub fn parse_corpus(json: &str) -> Result<Vec<Dialogue>> {
    let corpus: FocusCorpus = serde_json::from_str(json)?;
    Ok(corpus.data)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "data": [
            {
                "dialogID": "d-1",
                "persona": ["I live in Scotland.", "I like castles."],
                "utterance": [
                    {
                        "dialogue1": ["Where is this castle?", "It is in Scotland."],
                        "persona_candidate": ["I live in Scotland.", "I like castles."],
                        "persona_grounding": [true, false],
                        "knowledge_candidates": ["Built in 1200.", "Located in Scotland."],
                        "knowledge_answer_index": 1
                    }
                ],
                "landmark_link": "https://example.org/castle"
            }
        ]
    }"#;

    #[test]
    fn test_parse_corpus() {
        let dialogues = parse_corpus(SAMPLE).unwrap();
        assert_eq!(dialogues.len(), 1);

        let d = &dialogues[0];
        assert_eq!(d.dialog_id, "d-1");
        assert_eq!(d.turns.len(), 1);
        assert_eq!(d.turns[0].gold_index(), Some(1));
        assert_eq!(
            d.turns[0].last_user_utterance().as_deref(),
            Some("Where is this castle?")
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let loader = FocusLoader::new(file.path());
        assert_eq!(loader.load_all().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let loader = FocusLoader::new("./does/not/exist/train_focus.json");
        let err = loader.load_all().unwrap_err();
        assert!(err.to_string().contains("train_focus.json"));
    }
}
