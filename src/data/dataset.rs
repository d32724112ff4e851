use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

/// One tokenised and padded pair.
/// Sequence format: [CLS] text [SEP] candidate [SEP] [PAD]...
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationItem {
    pub input_ids:      Vec<u32>,
    pub attention_mask: Vec<u32>,
    pub label:          usize,
    pub group_id:       usize,
}

pub struct KnowledgeDataset {
    items: Vec<ClassificationItem>,
}

impl KnowledgeDataset {
    pub fn new(items: Vec<ClassificationItem>) -> Self { Self { items } }

    pub fn positive_count(&self) -> usize {
        self.items.iter().filter(|i| i.label == 1).count()
    }
}

impl Dataset<ClassificationItem> for KnowledgeDataset {
    fn get(&self, index: usize) -> Option<ClassificationItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}
