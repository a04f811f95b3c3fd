// ============================================================
// Layer 2 — Evaluation, TestUseCase, ResultsUseCase
// ============================================================
// `evaluate` runs the model over one split without training:
//
//   val         — `max_dev_itr` batches (0 → one full pass)
//   test, train — until the split's epoch counter moves past
//                 its value at the start of the call, i.e.
//                 exactly one pass from where the reader is
//
// Every call writes results/<dir>/<mode>_samples_<step>.txt and
// appends to results/<dir>/<mode>_history.txt, where <dir> is
// `val` for validation and `test` for test and train passes.
//
// TestUseCase and ResultsUseCase rebuild a trained model from
// its experiment directory and report on the held-out data.

use anyhow::Result;
use std::{fmt, path::Path};

use crate::application::train_use_case::{load_dataset, TrainConfig};
use crate::data::{rescale::rescale, split::BatchSource};
use crate::domain::{
    batch::{Batch, BatchOptions, ScoreRange},
    traits::SimilarityRegressor,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{self, EvalRecord, ResultsWriter},
};
use crate::ml::trainer::{build_regressor, restore_model};

/// Step tag used when evaluating outside a training run
pub const NO_STEP: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
    Val,
    Test,
    Train,
}

impl EvalMode {
    pub fn name(&self) -> &'static str {
        match self {
            EvalMode::Val   => "val",
            EvalMode::Test  => "test",
            EvalMode::Train => "train",
        }
    }

    /// Subdirectory of results/ the files go to
    pub fn results_subdir(&self) -> &'static str {
        match self {
            EvalMode::Val => "val",
            EvalMode::Test | EvalMode::Train => "test",
        }
    }
}

impl fmt::Display for EvalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Averages over the evaluated batches plus every evaluated pair
#[derive(Debug, Clone, Default)]
pub struct EvalReport {
    /// Mean of the per-batch MSE
    pub avg_loss:    f64,
    /// Mean of the per-batch Pearson correlation
    pub avg_pearson: f64,
    pub batches:     usize,
    pub records:     Vec<EvalRecord>,
}

impl EvalReport {
    pub fn predictions(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.prediction).collect()
    }

    pub fn truths(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.truth).collect()
    }

    /// Pearson over all pairs at once rather than per batch
    pub fn overall_pearson(&self) -> f64 {
        metrics::pearson(&self.predictions(), &self.truths())
    }

    pub fn overall_mse(&self) -> f64 {
        metrics::mse(&self.predictions(), &self.truths())
    }
}

pub fn evaluate<R, S>(
    model:        &R,
    split:        &mut S,
    mode:         EvalMode,
    step:         i64,
    options:      &BatchOptions,
    max_dev_itr:  usize,
    results_root: &Path,
) -> Result<EvalReport>
where
    R: SimilarityRegressor + ?Sized,
    S: BatchSource + ?Sized,
{
    tracing::info!("Running evaluation {}", mode);
    let start_epoch = split.epochs_completed();
    let mut report  = EvalReport::default();
    let (mut loss_sum, mut pco_sum) = (0.0f64, 0.0f64);

    loop {
        let done = match mode {
            EvalMode::Val if max_dev_itr > 0 => report.batches >= max_dev_itr,
            _ => split.epochs_completed() > start_epoch,
        };
        if done {
            break;
        }

        let batch = split.next_batch(options)?;
        let out   = model.evaluate_step(&batch)?;
        loss_sum += out.mse;
        pco_sum  += out.pearson;
        report.batches += 1;
        collect_records(split, &batch, &out.predictions, &mut report.records);
    }

    let n = report.batches.max(1) as f64;
    report.avg_loss    = loss_sum / n;
    report.avg_pearson = pco_sum / n;
    tracing::info!("{}:\tLoss: {:.6}\tPco: {:.6}", mode, report.avg_loss, report.avg_pearson);

    let writer = ResultsWriter::new(results_root.join(mode.results_subdir()))?;
    writer.write_samples(mode.name(), step, &report.records)?;
    writer.append_history(mode.name(), step, report.avg_pearson, report.avg_loss)?;
    tracing::debug!("{mode} results written to '{}'", writer.dir().display());
    Ok(report)
}

fn collect_records<S: BatchSource + ?Sized>(
    split:       &S,
    batch:       &Batch,
    predictions: &[f64],
    out:         &mut Vec<EvalRecord>,
) {
    let render = |i: usize, side: &crate::domain::batch::Sentences| -> String {
        if let Some(ids) = side.as_ids() {
            split.vocabulary().decode(&ids[i])
        } else if let Some(tokens) = side.as_tokens() {
            tokens[i].join(" ")
        } else {
            String::new()
        }
    };
    for (i, (&prediction, &truth)) in predictions.iter().zip(batch.sim()).enumerate() {
        out.push(EvalRecord {
            s1: render(i, batch.s1()),
            s2: render(i, batch.s2()),
            prediction,
            truth,
        });
    }
}

/// Map predictions and ground truth of `report` from `from` into `to`.
pub fn rescale_report(report: &EvalReport, from: ScoreRange, to: ScoreRange) -> EvalReport {
    let predictions = rescale(&report.predictions(), from, to);
    let truths      = rescale(&report.truths(), from, to);
    let records = report
        .records
        .iter()
        .zip(predictions.into_iter().zip(truths))
        .map(|(r, (prediction, truth))| EvalRecord { prediction, truth, ..r.clone() })
        .collect();
    EvalReport { records, ..report.clone() }
}

// ─── Restoring a trained run ──────────────────────────────────────────────────
/// Where a trained run lives, plus optional overrides
#[derive(Debug, Clone)]
pub struct RunLocation {
    pub checkpoint_root: String,
    pub experiment_name: String,
    /// Read the dataset from here instead of the directory used in training
    pub data_dir:        Option<String>,
}

impl RunLocation {
    fn load(&self) -> Result<(TrainConfig, CheckpointManager)> {
        let ckpt    = CheckpointManager::open_experiment(&self.checkpoint_root, &self.experiment_name)?;
        let mut cfg = ckpt.load_config()?;
        if let Some(dir) = &self.data_dir {
            cfg.data_dir = dir.clone();
        }
        Ok((cfg, ckpt))
    }
}

// ─── TestUseCase ──────────────────────────────────────────────────────────────
pub struct TestUseCase {
    run:     RunLocation,
    rescale: Option<ScoreRange>,
}

/// Outcome of `test`
#[derive(Debug, Clone)]
pub struct TestOutcome {
    pub report:   EvalReport,
    /// Same pairs with scores mapped into the requested range
    pub rescaled: Option<EvalReport>,
}

impl TestUseCase {
    pub fn new(run: RunLocation, rescale: Option<ScoreRange>) -> Self {
        Self { run, rescale }
    }

    pub fn execute(&self) -> Result<TestOutcome> {
        let (cfg, ckpt) = self.run.load()?;
        let results_root = ckpt.results_dir();
        let mut sts      = load_dataset(&cfg)?;

        let model     = restore_model(&cfg, sts.vocab_size(), sts.vocab().pad_id(), &ckpt)?;
        let regressor = build_regressor(&cfg, model, ckpt)?;

        let mut test = sts.test.session()?;
        let report = evaluate(
            regressor.as_ref(), &mut test, EvalMode::Test, NO_STEP,
            &cfg.batch_options(), 0, &results_root,
        )?;
        let rescaled = self.rescale.map(|to| rescale_report(&report, cfg.rescale, to));
        Ok(TestOutcome { report, rescaled })
    }
}

// ─── ResultsUseCase ───────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct ResultsOutcome {
    pub test:             EvalReport,
    pub train:            EvalReport,
    /// Pearson over every test and train pair together
    pub combined_pearson: f64,
    pub combined_mse:     f64,
}

pub struct ResultsUseCase {
    run: RunLocation,
}

impl ResultsUseCase {
    pub fn new(run: RunLocation) -> Self {
        Self { run }
    }

    pub fn execute(&self) -> Result<ResultsOutcome> {
        let (cfg, ckpt) = self.run.load()?;
        let results_root = ckpt.results_dir();
        let mut sts      = load_dataset(&cfg)?;

        let model     = restore_model(&cfg, sts.vocab_size(), sts.vocab().pad_id(), &ckpt)?;
        let regressor = build_regressor(&cfg, model, ckpt)?;
        let options   = cfg.batch_options();

        let mut test  = sts.test.session()?;
        let mut train = sts.train.session()?;
        let test_report = evaluate(
            regressor.as_ref(), &mut test, EvalMode::Test, NO_STEP, &options, 0, &results_root,
        )?;
        let train_report = evaluate(
            regressor.as_ref(), &mut train, EvalMode::Train, NO_STEP, &options, 0, &results_root,
        )?;

        Ok(combine(test_report, train_report))
    }
}

fn combine(test: EvalReport, train: EvalReport) -> ResultsOutcome {
    let predictions: Vec<f64> = test.predictions().into_iter().chain(train.predictions()).collect();
    let truths: Vec<f64>      = test.truths().into_iter().chain(train.truths()).collect();
    ResultsOutcome {
        combined_pearson: metrics::pearson(&predictions, &truths),
        combined_mse:     metrics::mse(&predictions, &truths),
        test,
        train,
    }
}
