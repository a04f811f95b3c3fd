// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits that every other layer speaks:
//
//   error.rs  — the dataset error kinds
//   batch.rs  — Batch, Sentences, BatchOptions, ScoreRange
//   traits.rs — the model contract (SimilarityRegressor)
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits

// Error kinds surfaced by the data layer
pub mod error;

// The batch record and its request options
pub mod batch;

// Core abstractions (traits) that other layers implement
pub mod traits;
