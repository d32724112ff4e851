// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// The Burn-specific part of the crate.
//
//   model.rs      — transformer encoder with a two-class head:
//                   • token + position embeddings
//                   • multi-head self-attention blocks
//                   • GELU feed-forward, layer norm, residuals
//                   • first-token pooler and classifier
//
//   classifier.rs — training/validation steps, optimizer and
//                   validation metrics around the model
//
//   trainer.rs    — the epoch loop: optimizer steps, validation,
//                   logging, best-checkpoint saving and resume
//
//   device.rs     — backend choices per accelerator/precision
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Vaswani et al. (2017) Attention Is All You Need
//            He et al. (2021) DeBERTa

/// Transformer encoder classification model
pub mod model;

/// Training-loop adapter and validation metrics
pub mod classifier;

/// Training loop with validation and checkpointing
pub mod trainer;

/// Backends and device classes
pub mod device;
