// ============================================================
// Layer 4 — Similarity Batcher
// ============================================================
// Converts a domain Batch (id sequences + rescaled scores) into
// tensors on a Burn device.
//
// How batching works here:
//   Input:  Batch with N pairs; s1/s2 are N id sequences
//   Output: SimilarityBatch with s1, s2: [N, S] and sim: [N]
//
//   Each side is flattened row by row and reshaped:
//   [r1_t1, ..., r1_tS, r2_t1, ..., rN_tS] → [N, S]
//
// Sequences are normally padded to a fixed length by the split
// already. If they are ragged (pad = 0), each side is padded
// with the pad id to its own longest row; an all-empty side
// becomes a single pad column so the tensor is never zero-width.

use burn::{prelude::*, tensor::TensorData};

use crate::domain::{batch::Batch, error::DatasetError};

// ─── SimilarityBatch ──────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct SimilarityBatch<B: Backend> {
    /// First sentences — shape: [batch_size, seq_len]
    pub s1: Tensor<B, 2, Int>,
    /// Second sentences — shape: [batch_size, seq_len]
    pub s2: Tensor<B, 2, Int>,
    /// Target similarities in the requested range — shape: [batch_size]
    pub sim: Tensor<B, 1>,
}

// ─── SimilarityBatcher ────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct SimilarityBatcher<B: Backend> {
    pub device: B::Device,
    pub pad_id: usize,
}

impl<B: Backend> SimilarityBatcher<B> {
    pub fn new(device: B::Device, pad_id: usize) -> Self {
        Self { device, pad_id }
    }

    pub fn batch(&self, batch: &Batch) -> Result<SimilarityBatch<B>, DatasetError> {
        let (Some(s1), Some(s2)) = (batch.s1().as_ids(), batch.s2().as_ids()) else {
            return Err(DatasetError::Usage(
                "raw token batches cannot be fed to the model; request ids (raw = false)"
                    .to_string(),
            ));
        };
        if batch.is_empty() {
            return Err(DatasetError::Validation("cannot build tensors from an empty batch".into()));
        }

        let sim: Vec<f32> = batch.sim().iter().map(|&v| v as f32).collect();
        let n = sim.len();

        Ok(SimilarityBatch {
            s1:  self.ids_tensor(s1),
            s2:  self.ids_tensor(s2),
            sim: Tensor::from_data(TensorData::new(sim, [n]), &self.device),
        })
    }

    fn ids_tensor(&self, rows: &[Vec<usize>]) -> Tensor<B, 2, Int> {
        let seq_len = rows.iter().map(Vec::len).max().unwrap_or(0).max(1);
        let flat: Vec<i64> = rows
            .iter()
            .flat_map(|row| {
                row.iter()
                    .map(|&id| id as i64)
                    .chain(std::iter::repeat(self.pad_id as i64))
                    .take(seq_len)
            })
            .collect();
        Tensor::from_data(TensorData::new(flat, [rows.len(), seq_len]), &self.device)
    }
}
