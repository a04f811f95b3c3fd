// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The model is an external collaborator. The drivers in the
// application layer only ever talk to it through this contract:
//
//   batch of ids + rescaled targets ──► train_step / evaluate_step
//                                   ◄── loss, correlation, predictions
//
// Implementations:
//   - BurnRegressor (ml::trainer) → siamese regressor on Burn
//   - test doubles in the application layer tests

use anyhow::Result;
use crate::domain::batch::Batch;

// ─── StepOutput ───────────────────────────────────────────────────────────────
/// What the model reports back for one batch.
#[derive(Debug, Clone, Default)]
pub struct StepOutput {
    /// Global step after this call (only advanced by train_step)
    pub step: usize,
    /// The objective the model optimises
    pub loss: f64,
    /// Mean squared error between predictions and targets
    pub mse: f64,
    /// Pearson correlation between predictions and targets
    pub pearson: f64,
    /// One predicted score per pair, in the target range
    pub predictions: Vec<f64>,
}

// ─── SimilarityRegressor ──────────────────────────────────────────────────────
/// Any model that can learn to predict pair similarity.
pub trait SimilarityRegressor {
    /// Run forward + backward + optimiser update on one batch.
    /// `epoch` is the training split's completed-epoch counter.
    fn train_step(&mut self, batch: &Batch, epoch: usize) -> Result<StepOutput>;

    /// Forward pass only, no parameter update.
    fn evaluate_step(&self, batch: &Batch) -> Result<StepOutput>;

    /// Persist the current weights, tagged with the global step.
    fn save_checkpoint(&self, step: usize) -> Result<()>;
}
