// ============================================================
// Layer 4 — Knowledge Batcher
// ============================================================
// Implements Burn's Batcher trait to stack ClassificationItems
// into tensors.
//
//   Input:  Vec of N items, each padded to length S
//   Output: KnowledgeBatch with [N, S] id/mask tensors and an
//           [N] label tensor
//
// Group ids stay on the host: they are only needed to regroup
// validation scores per dialogue turn.

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::ClassificationItem;

/// A batch of pairs ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct KnowledgeBatch<B: Backend> {
    /// Token ids — shape: [batch_size, seq_len]
    pub input_ids: Tensor<B, 2, Int>,

    /// 1 = real token, 0 = padding — shape: [batch_size, seq_len]
    pub attention_mask: Tensor<B, 2, Int>,

    /// 1 = gold knowledge, 0 = other — shape: [batch_size]
    pub labels: Tensor<B, 1, Int>,

    /// Dialogue turn of each row
    pub group_ids: Vec<usize>,
}

#[derive(Clone, Debug)]
pub struct KnowledgeBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> KnowledgeBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<ClassificationItem, KnowledgeBatch<B>> for KnowledgeBatcher<B> {
    fn batch(&self, items: Vec<ClassificationItem>) -> KnowledgeBatch<B> {
        let batch_size = items.len();
        // All sequences are pre-padded to the same length
        let seq_len    = items.first().map_or(0, |i| i.input_ids.len());

        let input_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.input_ids.iter().map(|&x| x as i32))
            .collect();

        let mask_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.attention_mask.iter().map(|&x| x as i32))
            .collect();

        let labels: Vec<i32>     = items.iter().map(|s| s.label as i32).collect();
        let group_ids: Vec<usize> = items.iter().map(|s| s.group_id).collect();

        let input_ids = Tensor::<B, 1, Int>::from_ints(
            input_flat.as_slice(), &self.device
        ).reshape([batch_size, seq_len]);

        let attention_mask = Tensor::<B, 1, Int>::from_ints(
            mask_flat.as_slice(), &self.device
        ).reshape([batch_size, seq_len]);

        let labels = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device);

        KnowledgeBatch {
            input_ids,
            attention_mask,
            labels,
            group_ids,
        }
    }
}
