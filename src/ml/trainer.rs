// ============================================================
// Layer 5 — Burn Regressor
// ============================================================
// Implements the SimilarityRegressor contract on Burn:
//
//   train_step    — forward on Autodiff<NdArray>, MSE loss,
//                   backward, one optimiser update
//   evaluate_step — model.valid() (plain NdArray, no autodiff,
//                   dropout off), forward + loss only
//
// Key Burn 0.20 insight:
//   - Training uses TrainBackend (Autodiff<NdArray>) for gradients
//   - model.valid() returns the model on EvalBackend (NdArray)
//   - The evaluation batcher must build EvalBackend tensors
//
// The optimiser is chosen by name:
//   adam, gradient_descent, adagrad, rmsprop
// L2 regularisation (l2_reg_beta) is applied as weight decay
// for adam and gradient_descent.

use anyhow::{anyhow, Result};
use burn::{
    backend::{Autodiff, NdArray},
    module::AutodiffModule,
    optim::{
        decay::WeightDecayConfig, AdaGradConfig, AdamConfig, GradientsParams, Optimizer,
        RmsPropConfig, SgdConfig,
    },
    prelude::*,
    tensor::TensorData,
};
use ndarray::Array2;
use std::{fmt, str::FromStr};

use crate::application::train_use_case::TrainConfig;
use crate::data::batcher::SimilarityBatcher;
use crate::domain::{
    batch::Batch,
    error::DatasetError,
    traits::{SimilarityRegressor, StepOutput},
};
use crate::infra::{checkpoint::CheckpointManager, metrics};
use crate::ml::model::{SimilarityModel, SimilarityModelConfig};

pub type TrainBackend = Autodiff<NdArray>;
pub type EvalBackend  = NdArray;

pub type TrainModel = SimilarityModel<TrainBackend>;

// ─── Optimiser choice ─────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerKind {
    Adam,
    GradientDescent,
    Adagrad,
    Rmsprop,
}

impl FromStr for OptimizerKind {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "adam"             => Ok(Self::Adam),
            "gradient_descent" => Ok(Self::GradientDescent),
            "adagrad"          => Ok(Self::Adagrad),
            "rmsprop"          => Ok(Self::Rmsprop),
            "adadelta"         => Err(DatasetError::NotImplemented(
                "the adadelta optimizer is not available".into(),
            )),
            other => Err(DatasetError::Validation(format!(
                "unknown optimizer '{other}'; expected adam, gradient_descent, adagrad or rmsprop"
            ))),
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Adam            => "adam",
            Self::GradientDescent => "gradient_descent",
            Self::Adagrad         => "adagrad",
            Self::Rmsprop         => "rmsprop",
        };
        f.write_str(name)
    }
}

// ─── BurnRegressor ────────────────────────────────────────────────────────────
pub struct BurnRegressor<O> {
    model:         TrainModel,
    optim:         O,
    learning_rate: f64,
    device:        <TrainBackend as Backend>::Device,
    checkpoints:   CheckpointManager,
    step:          usize,
}

impl<O> BurnRegressor<O>
where
    O: Optimizer<TrainModel, TrainBackend>,
{
    pub fn new(model: TrainModel, optim: O, learning_rate: f64, checkpoints: CheckpointManager) -> Self {
        Self {
            model,
            optim,
            learning_rate,
            device: Default::default(),
            checkpoints,
            step: 0,
        }
    }

    #[cfg(test)]
    pub fn model(&self) -> &TrainModel {
        &self.model
    }

    #[cfg(test)]
    pub fn step(&self) -> usize {
        self.step
    }
}

impl<O> SimilarityRegressor for BurnRegressor<O>
where
    O: Optimizer<TrainModel, TrainBackend>,
{
    fn train_step(&mut self, batch: &Batch, epoch: usize) -> Result<StepOutput> {
        let batcher = SimilarityBatcher::<TrainBackend>::new(self.device.clone(), self.model.pad_id);
        let tensors = batcher.batch(batch)?;

        let (loss, predictions) = self.model.forward_loss(tensors.s1, tensors.s2, tensors.sim);
        let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
        let predictions = to_f64(predictions.into_data())?;

        // Backward pass + optimiser update
        let grads = GradientsParams::from_grads(loss.backward(), &self.model);
        self.model = self.optim.step(self.learning_rate, self.model.clone(), grads);
        self.step += 1;

        tracing::trace!("epoch {} step {} loss {:.6}", epoch, self.step, loss_val);
        Ok(step_output(self.step, loss_val, predictions, batch.sim()))
    }

    fn evaluate_step(&self, batch: &Batch) -> Result<StepOutput> {
        // No autodiff graph and no dropout
        let model   = self.model.valid();
        let batcher = SimilarityBatcher::<EvalBackend>::new(self.device.clone(), model.pad_id);
        let tensors = batcher.batch(batch)?;

        let (loss, predictions) = model.forward_loss(tensors.s1, tensors.s2, tensors.sim);
        let loss_val: f64 = loss.into_scalar().elem::<f64>();
        let predictions = to_f64(predictions.into_data())?;

        Ok(step_output(self.step, loss_val, predictions, batch.sim()))
    }

    fn save_checkpoint(&self, step: usize) -> Result<()> {
        self.checkpoints.save_model(&self.model, step)
    }
}

fn to_f64(data: TensorData) -> Result<Vec<f64>> {
    let values = data
        .to_vec::<f32>()
        .map_err(|e| anyhow!("Cannot read predictions: {e:?}"))?;
    Ok(values.into_iter().map(f64::from).collect())
}

fn step_output(step: usize, loss: f64, predictions: Vec<f64>, truth: &[f64]) -> StepOutput {
    StepOutput {
        step,
        loss,
        mse: metrics::mse(&predictions, truth),
        pearson: metrics::pearson(&predictions, truth),
        predictions,
    }
}

// ─── Construction ─────────────────────────────────────────────────────────────

/// Build the model for a run. A w2v matrix is used as the embedding
/// table when its shape matches; otherwise the table is random.
pub fn build_model(
    cfg:        &TrainConfig,
    vocab_size: usize,
    pad_id:     usize,
    w2v:        Option<&Array2<f32>>,
) -> TrainModel {
    let device: <TrainBackend as Backend>::Device = Default::default();
    let model_cfg = SimilarityModelConfig::new(vocab_size, cfg.embedding_dim, cfg.hidden_units)
        .with_dropout(cfg.dropout)
        .with_out_lo(cfg.rescale.lo())
        .with_out_hi(cfg.rescale.hi())
        .with_pad_id(pad_id);

    match w2v {
        Some(w) if w.dim() == (vocab_size, cfg.embedding_dim) => {
            tracing::info!("Initialising embeddings from w2v {:?}", w.dim());
            let values: Vec<f32> = w.iter().copied().collect();
            let weights = Tensor::from_data(TensorData::new(values, [vocab_size, cfg.embedding_dim]), &device);
            model_cfg.init_with_embeddings(weights, cfg.train_embeddings, &device)
        }
        Some(w) => {
            tracing::warn!(
                "Ignoring w2v of shape {:?}; model expects ({}, {})",
                w.dim(),
                vocab_size,
                cfg.embedding_dim
            );
            model_cfg.init(&device)
        }
        None => model_cfg.init(&device),
    }
}

/// Rebuild the architecture of a run and load its newest checkpoint.
pub fn restore_model(
    cfg:         &TrainConfig,
    vocab_size:  usize,
    pad_id:      usize,
    checkpoints: &CheckpointManager,
) -> Result<TrainModel> {
    let model = build_model(cfg, vocab_size, pad_id, None);
    checkpoints.load_model(model, &Default::default())
}

/// Wrap `model` with the optimiser named in the config.
pub fn build_regressor(
    cfg:         &TrainConfig,
    model:       TrainModel,
    checkpoints: CheckpointManager,
) -> Result<Box<dyn SimilarityRegressor>> {
    let kind: OptimizerKind = cfg.optimizer.parse()?;
    let decay = (cfg.l2_reg_beta > 0.0).then(|| WeightDecayConfig::new(cfg.l2_reg_beta as f32));
    let lr    = cfg.learning_rate;
    tracing::info!("Optimizer: {} (lr={}, l2={})", kind, lr, cfg.l2_reg_beta);

    let regressor: Box<dyn SimilarityRegressor> = match kind {
        OptimizerKind::Adam => {
            let optim = AdamConfig::new()
                .with_epsilon(1e-8)
                .with_weight_decay(decay)
                .init::<TrainBackend, TrainModel>();
            Box::new(BurnRegressor::new(model, optim, lr, checkpoints))
        }
        OptimizerKind::GradientDescent => {
            let optim = SgdConfig::new()
                .with_weight_decay(decay)
                .init::<TrainBackend, TrainModel>();
            Box::new(BurnRegressor::new(model, optim, lr, checkpoints))
        }
        OptimizerKind::Adagrad => {
            let optim = AdaGradConfig::new().init::<TrainBackend, TrainModel>();
            Box::new(BurnRegressor::new(model, optim, lr, checkpoints))
        }
        OptimizerKind::Rmsprop => {
            let optim = RmsPropConfig::new().init::<TrainBackend, TrainModel>();
            Box::new(BurnRegressor::new(model, optim, lr, checkpoints))
        }
    };
    Ok(regressor)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::batch::{ScoreRange, Sentences};
    use tempfile::tempdir;

    fn batch() -> Batch {
        Batch::new(
            Sentences::Ids(vec![vec![4, 5, 6, 0], vec![7, 8, 0, 0]]),
            Sentences::Ids(vec![vec![4, 5, 6, 0], vec![9, 0, 0, 0]]),
            vec![0.9, 0.1],
        )
        .unwrap()
    }

    fn config() -> TrainConfig {
        TrainConfig {
            embedding_dim: 8,
            hidden_units:  8,
            dropout:       0.0,
            learning_rate: 1e-2,
            ..TrainConfig::default()
        }
    }

    fn adam_regressor(model: TrainModel, dir: &std::path::Path) -> BurnRegressor<impl Optimizer<TrainModel, TrainBackend>> {
        let optim = AdamConfig::new().init::<TrainBackend, TrainModel>();
        BurnRegressor::new(model, optim, 1e-2, CheckpointManager::new(dir).unwrap())
    }

    #[test]
    fn test_optimizer_names() {
        assert_eq!("adam".parse::<OptimizerKind>().unwrap(), OptimizerKind::Adam);
        assert_eq!("rmsprop".parse::<OptimizerKind>().unwrap(), OptimizerKind::Rmsprop);
        assert!(matches!(
            "adadelta".parse::<OptimizerKind>(),
            Err(DatasetError::NotImplemented(_))
        ));
        assert!(matches!("lbfgs".parse::<OptimizerKind>(), Err(DatasetError::Validation(_))));
    }

    #[test]
    fn test_training_reduces_loss_and_counts_steps() {
        let dir       = tempdir().unwrap();
        let model     = build_model(&config(), 10, 0, None);
        let mut reg   = adam_regressor(model, dir.path());

        let first = reg.train_step(&batch(), 0).unwrap();
        for _ in 0..59 {
            reg.train_step(&batch(), 0).unwrap();
        }
        let last = reg.train_step(&batch(), 0).unwrap();
        assert_eq!(first.step, 1);
        assert_eq!(last.step, 61);
        assert!(last.loss < first.loss, "{} !< {}", last.loss, first.loss);
        assert_eq!(last.predictions.len(), 2);
    }

    #[test]
    fn test_evaluate_does_not_advance_step() {
        let dir     = tempdir().unwrap();
        let mut reg = adam_regressor(build_model(&config(), 10, 0, None), dir.path());
        reg.train_step(&batch(), 0).unwrap();

        let out = reg.evaluate_step(&batch()).unwrap();
        assert_eq!(out.step, 1);
        assert_eq!(reg.step(), 1);
        assert!(out.predictions.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_predictions_follow_target_range() {
        let dir   = tempdir().unwrap();
        let cfg   = TrainConfig { rescale: ScoreRange::new(1.0, 5.0).unwrap(), ..config() };
        let reg   = adam_regressor(build_model(&cfg, 10, 0, None), dir.path());

        let out = reg.evaluate_step(&batch()).unwrap();
        assert!(out.predictions.iter().all(|p| (1.0..=5.0).contains(p)));
    }

    #[test]
    fn test_frozen_w2v_embeddings_stay_put() {
        let dir = tempdir().unwrap();
        let cfg = TrainConfig { train_embeddings: false, ..config() };
        let w2v = Array2::from_elem((10, 8), 0.1f32);
        let mut reg = adam_regressor(build_model(&cfg, 10, 0, Some(&w2v)), dir.path());

        for _ in 0..3 {
            reg.train_step(&batch(), 0).unwrap();
        }
        let table = reg.model().embedding.weight.val().into_data().to_vec::<f32>().unwrap();
        assert!(table.iter().all(|&x| (x - 0.1).abs() < 1e-7));
    }

    #[test]
    fn test_save_checkpoint_and_restore() {
        let dir  = tempdir().unwrap();
        let cfg  = config();
        let mut reg = adam_regressor(build_model(&cfg, 10, 0, None), dir.path());
        reg.train_step(&batch(), 0).unwrap();
        reg.save_checkpoint(1).unwrap();

        let ckpt     = CheckpointManager::new(dir.path()).unwrap();
        let restored = restore_model(&cfg, 10, 0, &ckpt).unwrap();
        assert_eq!(restored.pad_id, 0);
    }

    #[test]
    fn test_build_regressor_dispatches_on_name() {
        let dir = tempdir().unwrap();
        for name in ["adam", "gradient_descent", "adagrad", "rmsprop"] {
            let cfg = TrainConfig { optimizer: name.into(), l2_reg_beta: 0.01, ..config() };
            let mut reg = build_regressor(
                &cfg,
                build_model(&cfg, 10, 0, None),
                CheckpointManager::new(dir.path()).unwrap(),
            )
            .unwrap();
            assert_eq!(reg.train_step(&batch(), 0).unwrap().step, 1);
        }

        let cfg = TrainConfig { optimizer: "adadelta".into(), ..config() };
        let err = build_regressor(&cfg, build_model(&cfg, 10, 0, None), CheckpointManager::new(dir.path()).unwrap())
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<DatasetError>(),
            Some(DatasetError::NotImplemented(_))
        ));
    }
}
