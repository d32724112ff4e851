// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by the other layers:
//
//   checkpoint.rs — best-checkpoint policy, filename templates,
//                   Burn record save/load for resuming
//
//   hub.rs        — pretrained tokenizer and configuration
//                   resolved through the model hub
//
//   tracking.rs   — the run logger: run directory, event
//                   history, optional remote sink
//
//   metrics.rs    — epoch metrics CSV
//
//   seed.rs       — seeding of every random generator
//
// Reference: Burn Book §5 (Records and Checkpointing)

/// Best-checkpoint policy and checkpoint files
pub mod checkpoint;

/// Pretrained model hub access
pub mod hub;

/// Run logger
pub mod tracking;

/// Epoch metrics CSV logger
pub mod metrics;

/// Random seeding
pub mod seed;
