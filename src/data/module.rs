// ============================================================
// Layer 4 — FoCus Data Module
// ============================================================
// Owns everything needed to turn the two FoCus split files into
// train and validation loaders for one run:
//
//   train/valid paths ─► FocusLoader ─► PairSampler(variant)
//                                            │
//                                            ▼
//                     DataLoader ◄─ Batcher ◄─ PairEncoder
//
// `setup` does the expensive work once; the loader methods can
// then be called with whichever backend the trainer runs on.

use anyhow::Result;
use burn::{
    data::{
        dataloader::{DataLoader, DataLoaderBuilder},
        dataset::Dataset,
    },
    prelude::*,
};
use rand::rngs::StdRng;
use std::{path::PathBuf, sync::Arc};

use crate::data::{
    batcher::{KnowledgeBatch, KnowledgeBatcher},
    dataset::{ClassificationItem, KnowledgeDataset},
    encoder::PairEncoder,
    loader::FocusLoader,
    sampler::{DataVariant, PairSampler},
};
use crate::domain::{dialogue::Dialogue, traits::DialogueSource};

/// Dialogues kept per split in debug mode.
pub const DEBUG_DIALOGUES: usize = 10;

/// Loader settings taken from the hyperparameter record.
///
/// `num_workers` only applies to the validation loader. Burn's
/// worker threads hand batches over in completion order, so the
/// train loader stays on one thread and its order depends on
/// `shuffle_seed` alone.
#[derive(Debug, Clone)]
pub struct LoaderSettings {
    pub train_batch_size: usize,
    pub valid_batch_size: usize,
    pub num_workers:      usize,
    pub shuffle_seed:     u64,
}

pub struct FocusDataModule {
    train_path: PathBuf,
    valid_path: PathBuf,
    variant:    DataVariant,
    encoder:    PairEncoder,
    settings:   LoaderSettings,
    debug:      bool,

    train_items: Vec<ClassificationItem>,
    valid_items: Vec<ClassificationItem>,
}

impl FocusDataModule {
    pub fn new(
        train_path: impl Into<PathBuf>,
        valid_path: impl Into<PathBuf>,
        variant:    DataVariant,
        encoder:    PairEncoder,
        settings:   LoaderSettings,
        debug:      bool,
    ) -> Self {
        Self {
            train_path: train_path.into(),
            valid_path: valid_path.into(),
            variant,
            encoder,
            settings,
            debug,
            train_items: Vec::new(),
            valid_items: Vec::new(),
        }
    }

    pub fn variant(&self) -> DataVariant {
        self.variant
    }

    /// Load both splits, derive labelled pairs and tokenise them.
    pub fn setup(&mut self, rng: StdRng) -> Result<()> {
        let train = self.read_split(&FocusLoader::new(&self.train_path))?;
        let valid = self.read_split(&FocusLoader::new(&self.valid_path))?;

        let mut sampler = PairSampler::new(self.variant, rng);
        let train_pairs = sampler.sample(&train);
        let valid_pairs = sampler.sample(&valid);

        self.train_items = self.encoder.encode_all(&train_pairs)?;
        self.valid_items = self.encoder.encode_all(&valid_pairs)?;

        tracing::info!(
            "Data module {} ready: {} train pairs, {} valid pairs (max_length={})",
            self.variant,
            self.train_items.len(),
            self.valid_items.len(),
            self.encoder.max_length(),
        );
        Ok(())
    }

    fn read_split(&self, source: &impl DialogueSource) -> Result<Vec<Dialogue>> {
        let mut dialogues = source.load_all()?;
        if self.debug {
            dialogues.truncate(DEBUG_DIALOGUES);
        }
        Ok(dialogues)
    }

    pub fn train_dataset(&self) -> KnowledgeDataset {
        KnowledgeDataset::new(self.train_items.clone())
    }

    pub fn valid_dataset(&self) -> KnowledgeDataset {
        KnowledgeDataset::new(self.valid_items.clone())
    }

    pub fn train_dataloader<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Arc<dyn DataLoader<KnowledgeBatch<B>>> {
        let dataset = self.train_dataset();
        tracing::debug!(
            "Train loader: {} of {} pairs positive",
            dataset.positive_count(),
            dataset.len()
        );
        DataLoaderBuilder::new(KnowledgeBatcher::<B>::new(device.clone()))
            .batch_size(self.settings.train_batch_size)
            .shuffle(self.settings.shuffle_seed)
            .build(dataset)
    }

    pub fn val_dataloader<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Arc<dyn DataLoader<KnowledgeBatch<B>>> {
        DataLoaderBuilder::new(KnowledgeBatcher::<B>::new(device.clone()))
            .batch_size(self.settings.valid_batch_size)
            .num_workers(self.settings.num_workers)
            .build(self.valid_dataset())
    }
}
