use burn::{
    module::Param,
    nn::{
        loss::{MseLoss, Reduction},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::{relu, sigmoid},
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally; do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct SimilarityModelConfig {
    pub vocab_size:    usize,
    pub embedding_dim: usize,
    pub hidden_units:  usize,
    #[config(default = 0.5)]
    pub dropout:       f64,
    #[config(default = 0.0)]
    pub out_lo:        f64,
    #[config(default = 1.0)]
    pub out_hi:        f64,
    #[config(default = 0)]
    pub pad_id:        usize,
}

impl SimilarityModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SimilarityModel<B> {
        let embedding = EmbeddingConfig::new(self.vocab_size, self.embedding_dim).init(device);
        self.assemble(embedding, device)
    }

    /// Same architecture, embedding table taken from a [vocab_size, dim]
    /// matrix. A frozen table gets no gradient.
    pub fn init_with_embeddings<B: Backend>(
        &self,
        weights:   Tensor<B, 2>,
        trainable: bool,
        device:    &B::Device,
    ) -> SimilarityModel<B> {
        let mut embedding = EmbeddingConfig::new(self.vocab_size, self.embedding_dim).init(device);
        embedding.weight = Param::from_tensor(weights);
        let embedding = if trainable { embedding } else { embedding.no_grad() };
        self.assemble(embedding, device)
    }

    fn assemble<B: Backend>(&self, embedding: Embedding<B>, device: &B::Device) -> SimilarityModel<B> {
        let projection = LinearConfig::new(self.embedding_dim, self.hidden_units).init(device);
        // |h1 - h2| and h1 * h2 side by side
        let head    = LinearConfig::new(2 * self.hidden_units, 1).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        SimilarityModel {
            embedding, projection, head, dropout,
            out_lo: self.out_lo,
            out_hi: self.out_hi,
            pad_id: self.pad_id,
        }
    }
}

/// Siamese regressor: both sentences share embedding and projection,
/// the head scores how the two sentence vectors relate.
#[derive(Module, Debug)]
pub struct SimilarityModel<B: Backend> {
    pub embedding:  Embedding<B>,
    pub projection: Linear<B>,
    pub head:       Linear<B>,
    pub dropout:    Dropout,
    pub out_lo:     f64,
    pub out_hi:     f64,
    pub pad_id:     usize,
}

impl<B: Backend> SimilarityModel<B> {
    /// ids: [batch, seq_len] → sentence vectors [batch, hidden_units]
    pub fn encode(&self, ids: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let [batch_size, seq_len] = ids.dims();

        // 1.0 for real tokens, 0.0 for padding
        let mask = ids.clone().equal_elem(self.pad_id as i64).bool_not().float();

        let emb = self.embedding.forward(ids); // [batch, seq_len, dim]
        let [_, _, dim] = emb.dims();

        // Mean over the real tokens only; an all-pad row pools to zero.
        let summed = (emb * mask.clone().reshape([batch_size, seq_len, 1]))
            .sum_dim(1)
            .reshape([batch_size, dim]);
        let counts = mask.sum_dim(1).clamp_min(1.0); // [batch, 1]
        let pooled = summed / counts;

        relu(self.projection.forward(pooled))
    }

    /// s1, s2: [batch, seq_len] → similarity in [out_lo, out_hi]: [batch]
    pub fn forward(&self, s1: Tensor<B, 2, Int>, s2: Tensor<B, 2, Int>) -> Tensor<B, 1> {
        let [batch_size, _] = s1.dims();
        let h1 = self.encode(s1);
        let h2 = self.encode(s2);

        let features = Tensor::cat(vec![(h1.clone() - h2.clone()).abs(), h1 * h2], 1);
        let features = self.dropout.forward(features);

        let logits = self.head.forward(features).reshape([batch_size]);
        sigmoid(logits)
            .mul_scalar(self.out_hi - self.out_lo)
            .add_scalar(self.out_lo)
    }

    /// Mean squared error against `target` plus the predictions.
    pub fn forward_loss(
        &self,
        s1:     Tensor<B, 2, Int>,
        s2:     Tensor<B, 2, Int>,
        target: Tensor<B, 1>,
    ) -> (Tensor<B, 1>, Tensor<B, 1>) {
        let predictions = self.forward(s1, s2);
        let loss = MseLoss::new().forward(predictions.clone(), target, Reduction::Mean);
        (loss, predictions)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::TensorData};

    type B = NdArray;

    fn ids(rows: Vec<i64>, shape: [usize; 2]) -> Tensor<B, 2, Int> {
        Tensor::from_data(TensorData::new(rows, shape), &Default::default())
    }

    #[test]
    fn test_output_shape_and_range() {
        let device = Default::default();
        let model: SimilarityModel<B> = SimilarityModelConfig::new(10, 6, 4)
            .with_out_lo(1.0)
            .with_out_hi(5.0)
            .init(&device);

        let out = model.forward(
            ids(vec![3, 4, 0, 5, 0, 0], [2, 3]),
            ids(vec![3, 4, 5, 0, 0, 0], [2, 3]),
        );
        assert_eq!(out.dims(), [2]);
        for v in out.into_data().to_vec::<f32>().unwrap() {
            assert!((1.0..=5.0).contains(&v), "{v} outside [1, 5]");
        }
    }

    #[test]
    fn test_padding_does_not_change_the_sentence_vector() {
        let device = Default::default();
        let model: SimilarityModel<B> = SimilarityModelConfig::new(10, 6, 4).init(&device);

        let short  = model.encode(ids(vec![3, 4], [1, 2])).into_data().to_vec::<f32>().unwrap();
        let padded = model.encode(ids(vec![3, 4, 0, 0, 0], [1, 5])).into_data().to_vec::<f32>().unwrap();
        for (a, b) in short.iter().zip(&padded) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_pretrained_embeddings_are_used() {
        let device  = Default::default();
        let weights = Tensor::<B, 2>::from_data(TensorData::new(vec![0.5f32; 5 * 3], [5, 3]), &device);
        let model: SimilarityModel<B> = SimilarityModelConfig::new(5, 3, 2)
            .init_with_embeddings(weights, false, &device);

        let table = model.embedding.weight.val().into_data().to_vec::<f32>().unwrap();
        assert!(table.iter().all(|&x| x == 0.5));
    }

    #[test]
    fn test_loss_is_zero_for_exact_targets() {
        let device = Default::default();
        let model: SimilarityModel<B> = SimilarityModelConfig::new(10, 4, 3)
            .with_dropout(0.0)
            .init(&device);
        let s1 = ids(vec![1, 2, 3], [1, 3]);
        let s2 = ids(vec![3, 2, 1], [1, 3]);

        let pred = model.forward(s1.clone(), s2.clone());
        let (loss, _) = model.forward_loss(s1, s2, pred);
        assert!(loss.into_scalar().elem::<f64>().abs() < 1e-9);
    }
}
