// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a training run:
//
//   Step 1: Load the dataset group          (Layer 4 - data)
//   Step 2: Save config for test/results    (Layer 6 - infra)
//   Step 3: Build model + optimiser         (Layer 5 - ml)
//   Step 4: Open the three splits (scoped)  (Layer 4 - data)
//   Step 5: Run the step loop               (this file)
//
// The step loop, per training batch:
//   - every `evaluate_every` steps: validation pass of
//     `max_dev_itr` batches
//   - every `checkpoint_every` steps: checkpoint if the last
//     validation loss is not worse than the best so far
//   - on every epoch change: full test pass, checkpoint-if-
//     improved again, one metrics.csv row
// until the training split has completed `num_epochs` epochs.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::application::evaluate_use_case::{evaluate, EvalMode};
use crate::data::{
    split::BatchSource,
    sts::{Sts, StsOptions, DEFAULT_SUBSET},
};
use crate::domain::{
    batch::{BatchOptions, ScoreRange},
    error::DatasetError,
    traits::SimilarityRegressor,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::trainer::{build_model, build_regressor};

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters of a run. Saved next to the checkpoints so
// `test` and `results` rebuild exactly the same model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub dataset:          String,
    pub data_dir:         String,
    pub subset:           String,
    pub vocab_name:       Option<String>,
    /// Lowercase tokens when batching; pairs with `build-vocab --downcase`
    #[serde(default)]
    pub downcase:         bool,
    pub experiment_name:  String,
    pub checkpoint_root:  String,
    pub embedding_dim:    usize,
    pub hidden_units:     usize,
    pub dropout:          f64,
    pub l2_reg_beta:      f64,
    pub learning_rate:    f64,
    pub optimizer:        String,
    pub train_embeddings: bool,
    pub sequence_length:  usize,
    pub batch_size:       usize,
    pub num_epochs:       usize,
    pub evaluate_every:   usize,
    pub checkpoint_every: usize,
    pub max_dev_itr:      usize,
    /// Target range of the similarity scores fed to the model
    pub rescale:          ScoreRange,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            dataset:          Sts::NAME.to_string(),
            data_dir:         "data".to_string(),
            subset:           DEFAULT_SUBSET.to_string(),
            vocab_name:       None,
            downcase:         false,
            experiment_name:  "sts_siamese_regression".to_string(),
            checkpoint_root:  "experiments".to_string(),
            embedding_dim:    300,
            hidden_units:     128,
            dropout:          0.5,
            l2_reg_beta:      0.0,
            learning_rate:    1e-4,
            optimizer:        "adam".to_string(),
            train_embeddings: true,
            sequence_length:  100,
            batch_size:       64,
            num_epochs:       300,
            evaluate_every:   200,
            checkpoint_every: 200,
            max_dev_itr:      100,
            rescale:          ScoreRange::UNIT,
        }
    }
}

impl TrainConfig {
    /// The batch request every driver makes
    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            batch_size: self.batch_size,
            pad:        self.sequence_length,
            rescale:    self.rescale,
            downcase:   self.downcase,
            ..BatchOptions::default()
        }
    }
}

/// Open the dataset group named in the config.
pub fn load_dataset(cfg: &TrainConfig) -> Result<Sts> {
    if cfg.dataset != Sts::NAME {
        return Err(DatasetError::NotImplemented(format!(
            "dataset '{}' has not been implemented; available: {}",
            cfg.dataset,
            Sts::NAME
        ))
        .into());
    }
    tracing::info!("Using dataset: {}", Sts::DESCRIPTION);
    Sts::new(
        &cfg.data_dir,
        StsOptions {
            subset: cfg.subset.clone(),
            vocab_name: cfg.vocab_name.clone(),
            ..StsOptions::default()
        },
    )
}

// ─── Step loop ────────────────────────────────────────────────────────────────

/// The three splits a run reads from
pub struct Splits<'a, S: ?Sized> {
    pub train:      &'a mut S,
    pub validation: &'a mut S,
    pub test:       &'a mut S,
}

#[derive(Debug, Clone, Default)]
pub struct TrainSummary {
    pub steps:             usize,
    pub epochs:            usize,
    pub best_val_loss:     Option<f64>,
    pub checkpoints_saved: usize,
}

/// Checkpoint when `val_loss` is not worse than `best`; returns the new
/// best. Without any validation loss yet, the checkpoint is written and
/// `best` stays as it is.
pub fn maybe_save_checkpoint<R: SimilarityRegressor + ?Sized>(
    model:    &R,
    best:     Option<f64>,
    val_loss: Option<f64>,
    step:     usize,
) -> Result<(Option<f64>, bool)> {
    match (best, val_loss) {
        (Some(b), Some(v)) if v > b => Ok((best, false)),
        (_, v) => {
            model.save_checkpoint(step)?;
            tracing::info!("Saved model {} with avg_mse={:?}", step, v);
            Ok((v.or(best), true))
        }
    }
}

pub fn run_train_loop<R, S>(
    cfg:          &TrainConfig,
    model:        &mut R,
    splits:       Splits<'_, S>,
    results_root: &Path,
    metrics:      &MetricsLogger,
) -> Result<TrainSummary>
where
    R: SimilarityRegressor + ?Sized,
    S: BatchSource + ?Sized,
{
    let Splits { train, validation, test } = splits;
    let options = cfg.batch_options();

    let mut summary    = TrainSummary::default();
    let mut last_val   = None::<(f64, f64)>;
    let mut prev_epoch = train.epochs_completed();
    let mut epoch_loss = 0.0f64;
    let mut epoch_steps = 0usize;

    while train.epochs_completed() < cfg.num_epochs {
        let batch = train.next_batch(&options)?;
        let out   = model.train_step(&batch, train.epochs_completed())?;
        let step  = out.step;
        summary.steps = step;
        epoch_loss  += out.loss;
        epoch_steps += 1;

        // ── Periodic validation ───────────────────────────────────────────────
        if cfg.evaluate_every > 0 && step % cfg.evaluate_every == 0 {
            let report = evaluate(
                model, validation, EvalMode::Val, step as i64,
                &options, cfg.max_dev_itr, results_root,
            )?;
            last_val = Some((report.avg_loss, report.avg_pearson));
        }

        // ── Periodic checkpoint ───────────────────────────────────────────────
        if cfg.checkpoint_every > 0 && step % cfg.checkpoint_every == 0 {
            let (best, saved) =
                maybe_save_checkpoint(model, summary.best_val_loss, last_val.map(|v| v.0), step)?;
            summary.best_val_loss = best;
            summary.checkpoints_saved += saved as usize;
        }

        // ── Epoch change: full test pass ──────────────────────────────────────
        let epoch = train.epochs_completed();
        if epoch != prev_epoch {
            prev_epoch = epoch;
            let report = evaluate(
                model, test, EvalMode::Test, step as i64,
                &options, 0, results_root,
            )?;
            let (best, saved) =
                maybe_save_checkpoint(model, summary.best_val_loss, last_val.map(|v| v.0), step)?;
            summary.best_val_loss = best;
            summary.checkpoints_saved += saved as usize;

            let (val_loss, val_pearson) = last_val.unwrap_or((f64::NAN, f64::NAN));
            let row = EpochMetrics {
                epoch,
                step,
                train_loss: epoch_loss / epoch_steps.max(1) as f64,
                val_loss,
                val_pearson,
                test_mse: report.avg_loss,
                test_pearson: report.avg_pearson,
            };
            metrics.log(&row)?;
            println!(
                "Epoch {:>3}/{} | step {:>6} | train_loss={:.4} | val_loss={:.4} | test_mse={:.4} | test_pco={:.4}",
                epoch, cfg.num_epochs, step, row.train_loss, row.val_loss,
                row.test_mse, row.test_pearson,
            );
            epoch_loss  = 0.0;
            epoch_steps = 0;
        }
    }

    summary.epochs = train.epochs_completed();
    Ok(summary)
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<TrainSummary> {
        let cfg = &self.config;

        // ── Step 1: Dataset group ─────────────────────────────────────────────
        let mut sts = load_dataset(cfg)?;

        // ── Step 2: Experiment directory + config ─────────────────────────────
        let ckpt = CheckpointManager::for_experiment(&cfg.checkpoint_root, &cfg.experiment_name)?;
        ckpt.save_config(cfg)?;
        let results_root: PathBuf = ckpt.results_dir();
        let metrics = MetricsLogger::new(ckpt.dir())?;

        // ── Step 3: Model + optimiser ─────────────────────────────────────────
        let model = build_model(cfg, sts.vocab_size(), sts.vocab().pad_id(), sts.w2v());
        let mut regressor = build_regressor(cfg, model, ckpt)?;
        tracing::info!(
            "Model ready: vocab={}, embedding_dim={}, hidden_units={}",
            sts.vocab_size(), cfg.embedding_dim, cfg.hidden_units
        );

        // ── Step 4: Open the splits; the guards close them on every exit ─────
        tracing::info!("Opening the datasets");
        let mut train      = sts.train.session()?;
        let mut validation = sts.validation.session()?;
        let mut test       = sts.test.session()?;

        // ── Step 5: Step loop ─────────────────────────────────────────────────
        let summary = run_train_loop(
            cfg,
            regressor.as_mut(),
            Splits { train: &mut train, validation: &mut validation, test: &mut test },
            &results_root,
            &metrics,
        )?;

        tracing::info!(
            "Training complete after {} steps; epoch metrics in '{}'",
            summary.steps,
            metrics.csv_path().display()
        );
        Ok(summary)
    }
}
