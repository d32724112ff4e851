// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits describing the FoCus data and
// the labelled pairs derived from it.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O or network calls
//   - Only plain Rust structs, enums, and traits

// FoCus dialogues, turns and their candidates
pub mod dialogue;

// A labelled (text, knowledge candidate) pair
pub mod pair;

// Core abstractions (traits) that other layers implement
pub mod traits;
