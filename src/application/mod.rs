// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflows built from the other layers: training, evaluation
// of a finished run, vocabulary rebuilds and dependency-tree
// conversion.
//
// Rules for this layer:
//   - No model math here (Layer 5)
//   - No printing here (Layer 1)
//   - File formats belong to Layers 4 and 6
//
// Drivers take `SimilarityRegressor` / `BatchSource` trait
// objects, so they run against fakes in the tests below.

// Training loop with periodic validation and checkpointing
pub mod train_use_case;

// val / test / train evaluation, plus the `test` and `results` runs
pub mod evaluate_use_case;

pub mod vocab_use_case;

pub mod deptree_use_case;

#[cfg(test)]
pub mod test_support;
