// ============================================================
// Layer 6 — Metrics
// ============================================================
// Everything the drivers measure and write down:
//
//   pearson / mse      — per-batch agreement between predicted
//                        and ground-truth similarities
//   ResultsWriter      — per-evaluation files under results/:
//                          <mode>_samples_<step>.txt
//                            s1 \t s2 \t prediction \t ground truth
//                          <mode>_history.txt (appended)
//                            STEP:<n>\tTIME:<rfc3339>\tPCO:<p>\tMSE:<m>
//   MetricsLogger      — metrics.csv, one row per completed
//                        training epoch
//
// Example metrics.csv:
//   epoch,step,train_loss,val_loss,val_pearson,test_mse,test_pearson
//   1,120,0.061200,0.058100,0.412000,0.057300,0.420100

use anyhow::{Context, Result};
use std::{
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

// ─── Batch statistics ─────────────────────────────────────────────────────────

/// Mean squared error; 0.0 for empty input.
pub fn mse(predictions: &[f64], truth: &[f64]) -> f64 {
    let n = predictions.len().min(truth.len());
    if n == 0 {
        return 0.0;
    }
    predictions
        .iter()
        .zip(truth)
        .map(|(p, t)| (p - t).powi(2))
        .sum::<f64>()
        / n as f64
}

/// Pearson correlation coefficient.
/// Undefined for fewer than two points or a constant series; reported as 0.0.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let mean_x = x[..n].iter().sum::<f64>() / n as f64;
    let mean_y = y[..n].iter().sum::<f64>() / n as f64;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (a, b) in x[..n].iter().zip(&y[..n]) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov   += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    let denom = (var_x * var_y).sqrt();
    if denom <= f64::EPSILON {
        0.0
    } else {
        cov / denom
    }
}

// ─── Evaluation results ───────────────────────────────────────────────────────

/// One evaluated pair, as written to the samples file
#[derive(Debug, Clone, PartialEq)]
pub struct EvalRecord {
    pub s1:         String,
    pub s2:         String,
    pub prediction: f64,
    pub truth:      f64,
}

pub struct ResultsWriter {
    dir: PathBuf,
}

impl ResultsWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create results dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Overwrite `<mode>_samples_<step>.txt` with one line per pair.
    pub fn write_samples(&self, mode: &str, step: i64, records: &[EvalRecord]) -> Result<PathBuf> {
        let path = self.dir.join(format!("{mode}_samples_{step}.txt"));
        let file = File::create(&path)
            .with_context(|| format!("Cannot write samples to '{}'", path.display()))?;
        let mut w = BufWriter::new(file);
        for r in records {
            writeln!(w, "{}\t{}\t{}\t{}", r.s1, r.s2, r.prediction, r.truth)?;
        }
        w.flush()?;
        Ok(path)
    }

    /// Append one line to `<mode>_history.txt`.
    pub fn append_history(&self, mode: &str, step: i64, pearson: f64, mse: f64) -> Result<()> {
        let path = self.dir.join(format!("{mode}_history.txt"));
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Cannot append to '{}'", path.display()))?;
        writeln!(
            f,
            "STEP:{}\tTIME:{}\tPCO:{}\tMSE:{}",
            step,
            chrono::Local::now().to_rfc3339(),
            pearson,
            mse
        )?;
        Ok(())
    }
}

// ─── Epoch CSV ────────────────────────────────────────────────────────────────

/// One row of metrics.csv
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Completed epochs of the training split (starts at 1)
    pub epoch: usize,
    /// Global step when the epoch ended
    pub step: usize,
    /// Average training loss over the epoch's steps
    pub train_loss: f64,
    /// Most recent validation loss
    pub val_loss: f64,
    pub val_pearson: f64,
    /// Full test-split pass run at the epoch change
    pub test_mse: f64,
    pub test_pearson: f64,
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet, so
    /// resumed runs keep appending to the same file.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "epoch,step,train_loss,val_loss,val_pearson,test_mse,test_pearson")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot append to '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{},{:.6},{:.6},{:.6},{:.6},{:.6}",
            m.epoch,
            m.step,
            m.train_loss,
            m.val_loss,
            m.val_pearson,
            m.test_mse,
            m.test_pearson,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_loss={:.4}",
            m.epoch,
            m.train_loss,
            m.val_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
