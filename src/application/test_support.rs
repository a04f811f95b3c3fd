// Shared doubles for the driver tests

use anyhow::Result;
use std::{cell::RefCell, fs, path::Path, sync::Arc};

use crate::data::{split::DataSplit, vocabulary::{Vocabulary, RESERVED_TOKENS}};
use crate::domain::{
    batch::Batch,
    traits::{SimilarityRegressor, StepOutput},
};
use crate::infra::metrics;

/// Predicts the ground truth exactly and records checkpoint requests.
#[derive(Default)]
pub struct FakeRegressor {
    step:  usize,
    saved: RefCell<Vec<usize>>,
}

impl FakeRegressor {
    pub fn saved_steps(&self) -> Vec<usize> {
        self.saved.borrow().clone()
    }

    fn output(&self, batch: &Batch) -> StepOutput {
        let predictions = batch.sim().to_vec();
        StepOutput {
            step:    self.step,
            loss:    0.0,
            mse:     metrics::mse(&predictions, batch.sim()),
            pearson: metrics::pearson(&predictions, batch.sim()),
            predictions,
        }
    }
}

impl SimilarityRegressor for FakeRegressor {
    fn train_step(&mut self, batch: &Batch, _epoch: usize) -> Result<StepOutput> {
        self.step += 1;
        Ok(self.output(batch))
    }

    fn evaluate_step(&self, batch: &Batch) -> Result<StepOutput> {
        Ok(self.output(batch))
    }

    fn save_checkpoint(&self, step: usize) -> Result<()> {
        self.saved.borrow_mut().push(step);
        Ok(())
    }
}

/// A closed split of `n` rows "w<i> shared \t v<i> shared \t (i+1)/(n+1)"
/// whose vocabulary knows every token.
pub fn split_with_rows(dir: &Path, name: &str, n: usize) -> DataSplit {
    let path = dir.join(format!("{name}.txt"));
    let rows: String = (0..n)
        .map(|i| format!("w{i} shared\tv{i} shared\t{}\n", (i + 1) as f64 / (n + 1) as f64))
        .collect();
    fs::write(&path, rows).unwrap();

    let tokens = RESERVED_TOKENS
        .iter()
        .map(|t| t.to_string())
        .chain(std::iter::once("shared".to_string()))
        .chain((0..n).flat_map(|i| [format!("w{i}"), format!("v{i}")]));
    DataSplit::new(path, Arc::new(Vocabulary::from_tokens(tokens)))
}
