// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application and data layers program against these traits
// rather than the concrete loaders, so a synthetic source can be
// swapped in for tests.

use anyhow::Result;
use crate::domain::dialogue::Dialogue;

// ─── DialogueSource ───────────────────────────────────────────────────────────
/// Any component that can produce FoCus dialogues.
///
/// Implementations:
///   - FocusLoader → reads a FoCus JSON file from disk
pub trait DialogueSource {
    /// Load every dialogue this source holds.
    fn load_all(&self) -> Result<Vec<Dialogue>>;
}
