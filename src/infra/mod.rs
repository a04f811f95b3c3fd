// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// File formats and persistence shared by the other layers:
//
//   vocab_store.rs — Rebuilds a vocabulary from the training
//                    corpus and writes the vocab/metadata
//                    files next to the dataset.
//
//   embeddings.rs  — The w2v matrix (.npy via ndarray-npy):
//                    load, save, and a fresh random or
//                    GloVe-initialised matrix for a vocabulary.
//
//   checkpoint.rs  — Model weights per global step (Burn's
//                    CompactRecorder) plus the TrainConfig
//                    JSON that rebuilds the architecture.
//
//   metrics.rs     — Pearson / MSE, evaluation sample and
//                    history files, epoch CSV.

/// Corpus → vocabulary files
pub mod vocab_store;

/// Embedding matrix persistence and initialisation
pub mod embeddings;

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Evaluation statistics and result files
pub mod metrics;
