// ============================================================
// Layer 4 — Pair Encoder
// ============================================================
// Tokenises a (text, candidate) pair as a sentence pair:
//
//   [CLS] text [SEP] candidate [SEP] [PAD] ...
//
// The special tokens come from the tokenizer's own post
// processor, so whatever template the pretrained model ships
// with is respected. Truncation is longest-first so both sides
// keep as much as possible; padding is done here to a fixed
// length so the batcher can stack items directly.

use anyhow::{anyhow, Result};
use tokenizers::{Tokenizer, TruncationParams, TruncationStrategy};

use crate::data::dataset::ClassificationItem;
use crate::domain::pair::KnowledgePair;

/// Pad token names tried in order when looking up the pad id.
const PAD_TOKENS: [&str; 2] = ["[PAD]", "<pad>"];

pub struct PairEncoder {
    tokenizer:  Tokenizer,
    max_length: usize,
    pad_id:     u32,
}

impl PairEncoder {
    pub fn new(mut tokenizer: Tokenizer, max_length: usize) -> Result<Self> {
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                strategy: TruncationStrategy::LongestFirst,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("Cannot configure truncation: {e}"))?;
        // Padding is applied by hand below.
        tokenizer.with_padding(None);

        let pad_id = PAD_TOKENS
            .iter()
            .find_map(|t| tokenizer.token_to_id(t))
            .unwrap_or(0);

        Ok(Self { tokenizer, max_length, pad_id })
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn encode(&self, pair: &KnowledgePair) -> Result<ClassificationItem> {
        let encoding = self
            .tokenizer
            .encode((pair.text.as_str(), pair.candidate.as_str()), true)
            .map_err(|e| anyhow!("Tokenisation error: {e}"))?;

        let mut input_ids: Vec<u32> = encoding.get_ids().to_vec();
        input_ids.truncate(self.max_length);

        let mut attention_mask = vec![1u32; input_ids.len()];
        input_ids.resize(self.max_length, self.pad_id);
        attention_mask.resize(self.max_length, 0);

        Ok(ClassificationItem {
            input_ids,
            attention_mask,
            label:    pair.label,
            group_id: pair.group_id,
        })
    }

    pub fn encode_all(&self, pairs: &[KnowledgePair]) -> Result<Vec<ClassificationItem>> {
        pairs.iter().map(|p| self.encode(p)).collect()
    }
}


// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_pair_layout_and_padding() {
        let encoder = PairEncoder::new(tiny_tokenizer(), 10).unwrap();
        let pair    = KnowledgePair::new(4, "where is the castle", "in scotland", 1);
        let item    = encoder.encode(&pair).unwrap();

        assert_eq!(
            item.input_ids,
            vec![CLS, 4, 5, 6, 7, SEP, 9, 10, SEP, PAD]
        );
        assert_eq!(item.attention_mask, vec![1, 1, 1, 1, 1, 1, 1, 1, 1, 0]);
        assert_eq!(item.label, 1);
        assert_eq!(item.group_id, 4);
    }

    #[test]
    fn test_truncation_keeps_fixed_length() {
        let encoder = PairEncoder::new(tiny_tokenizer(), 8).unwrap();
        let long    = "the castle is the castle is the castle is the castle";
        let item    = encoder
            .encode(&KnowledgePair::new(0, long, "it is in scotland built in 1200", 0))
            .unwrap();

        assert_eq!(item.input_ids.len(), 8);
        assert_eq!(item.attention_mask.iter().sum::<u32>(), 8);
        assert_eq!(item.input_ids[0], CLS);
        assert_eq!(*item.input_ids.last().unwrap(), SEP);
    }

    #[test]
    fn test_unknown_words_map_to_unk() {
        let encoder = PairEncoder::new(tiny_tokenizer(), 6).unwrap();
        let item    = encoder
            .encode(&KnowledgePair::new(0, "lighthouse", "castle", 0))
            .unwrap();
        assert_eq!(item.input_ids, vec![CLS, 3, SEP, 7, SEP, PAD]);
    }
}
