// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores the similarity model using Burn's
// CompactRecorder, together with the run configuration needed
// to rebuild the same architecture later.
//
// Layout of one experiment directory:
//   <checkpoint_root>/<experiment_name>/
//     model_step_200.mpk     ← weights after global step 200
//     model_step_400.mpk
//     latest_step.json       ← step of the newest checkpoint
//     train_config.json      ← TrainConfig of the run
//     metrics.csv            ← one row per completed epoch
//     results/val/           ← validation samples + history
//     results/test/          ← test/train samples + history
//
// Checkpoints are keyed by global step rather than epoch:
// the training driver only saves when the validation loss
// did not get worse, which can happen at any step.

use anyhow::{bail, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::SimilarityModel;

const LATEST_FILE: &str = "latest_step.json";
const CONFIG_FILE: &str = "train_config.json";

/// Owns one experiment directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create the manager, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// `<root>/<experiment_name>`
    pub fn for_experiment(root: impl AsRef<Path>, experiment_name: &str) -> Result<Self> {
        Self::new(root.as_ref().join(experiment_name))
    }

    /// `<root>/<experiment_name>` of a finished run. Nothing is created;
    /// a missing directory is an error.
    pub fn open_experiment(root: impl AsRef<Path>, experiment_name: &str) -> Result<Self> {
        let dir = root.as_ref().join(experiment_name);
        if !dir.is_dir() {
            bail!(
                "No experiment '{}' under '{}'. Have you run 'train' first?",
                experiment_name,
                root.as_ref().display()
            );
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Root of the evaluation sample/history files
    pub fn results_dir(&self) -> PathBuf {
        self.dir.join("results")
    }

    /// Save model weights for a global step and point latest_step.json at it.
    pub fn save_model<B: Backend>(&self, model: &SimilarityModel<B>, step: usize) -> Result<()> {
        // The recorder appends its own extension
        let path = self.model_path(step);

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        let latest_path = self.dir.join(LATEST_FILE);
        fs::write(&latest_path, serde_json::to_string(&step)?)
            .with_context(|| format!("Failed to write '{}'", latest_path.display()))?;

        tracing::debug!("Saved checkpoint: step {}", step);
        Ok(())
    }

    /// Load the newest checkpoint into `model`, which must have the
    /// architecture the checkpoint was saved with.
    pub fn load_model<B: Backend>(
        &self,
        model:  SimilarityModel<B>,
        device: &B::Device,
    ) -> Result<SimilarityModel<B>> {
        let step = self.latest_step()?;
        let path = self.model_path(step);

        tracing::info!("Loading checkpoint from step {}", step);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?",
                    path.display())
            })?;

        Ok(model.load_record(record))
    }

    /// Persist the run configuration; `test` and `results` rebuild the
    /// model from it.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);

        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. \
                 Make sure you have run 'train' before 'test' or 'results'.",
                path.display()
            )
        })?;

        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config in '{}'", path.display()))
    }

    /// Step of the newest checkpoint; an error if none was saved yet.
    pub fn latest_step(&self) -> Result<usize> {
        let path = self.dir.join(LATEST_FILE);

        let s = fs::read_to_string(&path).with_context(|| {
            format!("Cannot find '{}'. Have you run 'train' first?", path.display())
        })?;

        Ok(serde_json::from_str::<usize>(&s)?)
    }

    fn model_path(&self, step: usize) -> PathBuf {
        self.dir.join(format!("model_step_{step}"))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use crate::ml::model::SimilarityModelConfig;
    use tempfile::tempdir;

    type B = NdArray;

    fn weights(model: &SimilarityModel<B>) -> Vec<f32> {
        model.embedding.weight.val().into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_config_round_trip() {
        let dir  = tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let cfg  = TrainConfig { batch_size: 7, experiment_name: "exp".into(), ..TrainConfig::default() };

        ckpt.save_config(&cfg).unwrap();
        let loaded = ckpt.load_config().unwrap();
        assert_eq!(loaded.batch_size, 7);
        assert_eq!(loaded.experiment_name, "exp");
    }

    #[test]
    fn test_missing_checkpoint_is_an_error() {
        let dir  = tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        assert!(ckpt.latest_step().is_err());
        assert!(ckpt.load_config().is_err());
    }

    #[test]
    fn test_open_experiment_never_creates_directories() {
        let dir = tempdir().unwrap();
        assert!(CheckpointManager::open_experiment(dir.path(), "ghost").is_err());
        assert!(!dir.path().join("ghost").exists());

        CheckpointManager::for_experiment(dir.path(), "run").unwrap();
        let ckpt = CheckpointManager::open_experiment(dir.path(), "run").unwrap();
        assert_eq!(ckpt.dir(), dir.path().join("run"));
    }

    #[test]
    fn test_latest_step_follows_last_save_and_weights_reload() {
        let dir    = tempdir().unwrap();
        let ckpt   = CheckpointManager::for_experiment(dir.path(), "run").unwrap();
        let device = Default::default();
        let cfg    = SimilarityModelConfig::new(12, 4, 3);
        let model: SimilarityModel<B> = cfg.init(&device);

        ckpt.save_model(&model, 3).unwrap();
        ckpt.save_model(&model, 7).unwrap();
        assert_eq!(ckpt.latest_step().unwrap(), 7);
        assert!(dir.path().join("run").join(LATEST_FILE).exists());

        let fresh: SimilarityModel<B> = cfg.init(&device);
        let loaded = ckpt.load_model(fresh, &device).unwrap();
        // CompactRecorder stores half precision
        for (a, b) in weights(&loaded).iter().zip(weights(&model)) {
            assert!((a - b).abs() < 1e-2);
        }
    }
}
