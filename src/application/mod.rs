// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Turns an experiment choice into a configured training run.
// No model math and no printing here; this layer only decides
// which pieces to build and in what order.
//
// Reference: Clean Architecture pattern

/// Run settings shared by every experiment
pub mod hyperparameters;

/// The experiment records and their launch plans
pub mod experiment;

// The training workflow
pub mod train_use_case;
