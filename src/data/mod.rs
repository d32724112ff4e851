// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from the FoCus JSON files to tensor batches:
//
//   train_focus.json / valid_focus.json
//       │
//       ▼
//   FocusLoader       → parses dialogues
//       │
//       ▼
//   PairSampler       → labelled (text, candidate) pairs (V1/V2/V3)
//       │
//       ▼
//   PairEncoder       → token ids + attention mask
//       │
//       ▼
//   KnowledgeDataset  → implements Burn's Dataset trait
//       │
//       ▼
//   KnowledgeBatcher  → stacks items into tensor batches
//       │
//       ▼
//   DataLoader        → feeds batches to the trainer
//
// FocusDataModule ties the steps together for one run.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads FoCus JSON files
pub mod loader;

/// Derives labelled pairs from dialogue turns
pub mod sampler;

/// Tokenises pairs to fixed-length id sequences
pub mod encoder;

/// Implements Burn's Dataset trait for encoded pairs
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Owns the split paths and builds the train/valid loaders
pub mod module;
