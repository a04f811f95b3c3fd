// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn model code lives here. The drivers above only see
// the SimilarityRegressor contract from the domain layer.
//
//   model.rs   — Siamese bag-of-embeddings regressor:
//                • shared embedding table (optionally w2v,
//                  optionally frozen)
//                • masked mean pooling + linear/ReLU encoder
//                • [|h1 - h2|, h1 * h2] → linear → sigmoid,
//                  scaled into the target score range
//
//   trainer.rs — BurnRegressor: train/evaluate steps, the
//                optimiser chosen by name, checkpoints

/// Siamese similarity model architecture
pub mod model;

/// SimilarityRegressor implementation and model construction
pub mod trainer;
