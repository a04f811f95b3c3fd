// ============================================================
// Layer 4 — STS Dataset Group
// ============================================================
// The semantic-text-similarity corpus ships dedicated train,
// validation and test splits of dependency-linearised pairs:
//
//   <data_root>/<subset>/
//     train/dep_train.txt
//     validation/dep_validation.txt
//     test/dep_test.txt
//     vocab.txt        ← shared by all three splits
//     metadata.txt     ← same tokens, for embedding projectors
//     w2v.npy          ← optional [vocab_size, dim] matrix
//
// The three splits hold one Arc<Vocabulary>. Rebuilding the
// vocabulary writes <name>_vocab.txt / <name>_metadata.txt
// (and optionally <name>_w2v.npy), switches the group over to
// those files and hands the new Arc to every split.

use anyhow::Result;
use ndarray::Array2;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::data::{split::DataSplit, vocabulary::Vocabulary};
use crate::domain::error::DatasetError;
use crate::infra::{
    embeddings::{load_w2v, preload_w2v, save_w2v},
    vocab_store::{VocabParams, VocabStore},
};

pub const DEFAULT_SUBSET: &str = "sts_small";

/// Construction options. Only the defaults are accepted: the
/// corpus comes with its own splits.
#[derive(Debug, Clone)]
pub struct StsOptions {
    pub train_validation_split: Option<f64>,
    pub test_split:             Option<f64>,
    pub use_defaults:           bool,
    pub subset:                 String,
    /// Load `<name>_vocab.txt` / `<name>_w2v.npy` instead of the defaults
    pub vocab_name:             Option<String>,
}

impl Default for StsOptions {
    fn default() -> Self {
        Self {
            train_validation_split: None,
            test_split:             None,
            use_defaults:           true,
            subset:                 DEFAULT_SUBSET.to_string(),
            vocab_name:             None,
        }
    }
}

/// Where every file of one subset lives
#[derive(Debug, Clone, PartialEq)]
pub struct StsPaths {
    pub root:       PathBuf,
    pub train:      PathBuf,
    pub validation: PathBuf,
    pub test:       PathBuf,
    pub vocab:      PathBuf,
    pub metadata:   PathBuf,
    pub w2v:        PathBuf,
}

impl StsPaths {
    pub fn new(data_root: impl AsRef<Path>, subset: &str, vocab_name: Option<&str>) -> Self {
        let root   = data_root.as_ref().join(subset);
        let prefix = vocab_name.map(|n| format!("{n}_")).unwrap_or_default();
        Self {
            train:      root.join("train").join("dep_train.txt"),
            validation: root.join("validation").join("dep_validation.txt"),
            test:       root.join("test").join("dep_test.txt"),
            vocab:      root.join(format!("{prefix}vocab.txt")),
            metadata:   root.join(format!("{prefix}metadata.txt")),
            w2v:        root.join(format!("{prefix}w2v.npy")),
            root,
        }
    }
}

/// How to build a fresh embedding matrix after a vocabulary rebuild
#[derive(Debug, Clone)]
pub struct EmbeddingInit {
    pub dim:        usize,
    /// GloVe-format text file with pretrained vectors
    pub pretrained: Option<PathBuf>,
    pub seed:       u64,
}

pub struct Sts {
    paths:          StsPaths,
    vocab:          Arc<Vocabulary>,
    w2v:            Option<Array2<f32>>,
    pub train:      DataSplit,
    pub validation: DataSplit,
    pub test:       DataSplit,
}

impl Sts {
    pub const NAME: &'static str = "sts";
    pub const DESCRIPTION: &'static str =
        "Semantic Text Similarity: MPD, SICK, Quora, StackExchange and SemEval \
         sentence pairs with dedicated train, validation and test splits";

    pub fn new(data_root: impl AsRef<Path>, options: StsOptions) -> Result<Self> {
        if options.train_validation_split.is_some()
            || options.test_split.is_some()
            || !options.use_defaults
        {
            return Err(DatasetError::NotImplemented(
                "STS does not support train_validation_split, test_split or \
                 use_defaults=false; it uses the dedicated splits of the source corpora"
                    .to_string(),
            )
            .into());
        }

        let paths = StsPaths::new(data_root, &options.subset, options.vocab_name.as_deref());
        let vocab = Arc::new(Vocabulary::load(&paths.vocab)?);

        let w2v = if paths.w2v.exists() {
            Some(load_w2v(&paths.w2v)?)
        } else {
            tracing::warn!("No embedding matrix at '{}'", paths.w2v.display());
            None
        };

        tracing::info!(
            "STS subset '{}' ready: {} vocabulary entries",
            options.subset,
            vocab.len()
        );

        Ok(Self {
            train:      DataSplit::new(&paths.train, Arc::clone(&vocab)),
            validation: DataSplit::new(&paths.validation, Arc::clone(&vocab)),
            test:       DataSplit::new(&paths.test, Arc::clone(&vocab)),
            paths,
            vocab,
            w2v,
        })
    }

    /// Rebuild the vocabulary from the training split and switch all
    /// splits over to it. With `embeddings`, a new matrix is built for
    /// the new vocabulary and saved as `<name>_w2v.npy`.
    pub fn create_vocabulary(
        &mut self,
        params:     &VocabParams,
        embeddings: Option<&EmbeddingInit>,
    ) -> Result<()> {
        let store     = VocabStore::new(&self.paths.root);
        let artifacts = store.build_and_save(&[self.paths.train.clone()], params)?;

        self.paths.vocab    = artifacts.vocab_path;
        self.paths.metadata = artifacts.metadata_path;
        self.paths.w2v      = self.paths.root.join(format!("{}_w2v.npy", params.name));
        self.refresh(embeddings)
    }

    fn refresh(&mut self, embeddings: Option<&EmbeddingInit>) -> Result<()> {
        self.vocab = Arc::new(Vocabulary::load(&self.paths.vocab)?);

        if let Some(init) = embeddings {
            let w2v = preload_w2v(&self.vocab, init.dim, init.pretrained.as_deref(), init.seed)?;
            save_w2v(&self.paths.w2v, &w2v)?;
            self.w2v = Some(w2v);
        } else if self.w2v.as_ref().is_some_and(|m| m.nrows() != self.vocab.len()) {
            tracing::warn!("Dropping embedding matrix that no longer matches the vocabulary");
            self.w2v = None;
        }

        for split in [&mut self.train, &mut self.validation, &mut self.test] {
            split.set_vocab(Arc::clone(&self.vocab));
        }
        tracing::info!("Vocabulary refreshed: {} entries", self.vocab.len());
        Ok(())
    }

    pub fn vocab(&self) -> &Arc<Vocabulary> {
        &self.vocab
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    pub fn w2v(&self) -> Option<&Array2<f32>> {
        self.w2v.as_ref()
    }

    pub fn paths(&self) -> &StsPaths {
        &self.paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    const ROWS: &str = "the cat sat\tthe cat ran\t0.9\n\
                        a dog barked\tthe cat sat\t0.1\n\
                        the dog sat\tthe cat sat\t0.6\n";

    fn layout() -> TempDir {
        let dir  = tempdir().unwrap();
        let root = dir.path().join(DEFAULT_SUBSET);
        for (sub, file) in [("train", "dep_train.txt"), ("validation", "dep_validation.txt"), ("test", "dep_test.txt")] {
            fs::create_dir_all(root.join(sub)).unwrap();
            fs::write(root.join(sub).join(file), ROWS).unwrap();
        }
        fs::write(root.join("vocab.txt"), "<PAD>\n<UNK>\n<GO>\n<EOS>\nthe\n").unwrap();
        dir
    }

    #[test]
    fn test_non_default_options_are_rejected() {
        let dir = layout();
        for opts in [
            StsOptions { train_validation_split: Some(0.8), ..StsOptions::default() },
            StsOptions { test_split: Some(0.1), ..StsOptions::default() },
            StsOptions { use_defaults: false, ..StsOptions::default() },
        ] {
            let err = Sts::new(dir.path(), opts).err().unwrap();
            assert!(matches!(
                err.downcast_ref::<DatasetError>(),
                Some(DatasetError::NotImplemented(_))
            ));
        }
    }

    #[test]
    fn test_missing_vocabulary_is_a_resource_error() {
        let dir = tempdir().unwrap();
        let err = Sts::new(dir.path(), StsOptions::default()).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<DatasetError>(),
            Some(DatasetError::Resource { .. })
        ));
    }

    #[test]
    fn test_layout_and_shared_vocabulary() {
        let dir = layout();
        let sts = Sts::new(dir.path(), StsOptions::default()).unwrap();

        assert_eq!(sts.vocab_size(), 5);
        assert!(sts.w2v().is_none());
        assert!(sts.paths().train.ends_with("train/dep_train.txt"));
        assert!(Arc::ptr_eq(sts.train.vocab(), sts.test.vocab()));
        assert!(Arc::ptr_eq(sts.validation.vocab(), sts.vocab()));
    }

    #[test]
    fn test_create_vocabulary_refreshes_every_split() {
        let dir     = layout();
        let mut sts = Sts::new(dir.path(), StsOptions::default()).unwrap();
        let params  = VocabParams { min_frequency: 1, ..VocabParams::default() };
        let init    = EmbeddingInit { dim: 4, pretrained: None, seed: 0 };

        sts.create_vocabulary(&params, Some(&init)).unwrap();

        assert!(sts.vocab_size() > 5);
        assert!(sts.vocab().contains("barked"));
        for split in [&sts.train, &sts.validation, &sts.test] {
            assert!(Arc::ptr_eq(split.vocab(), sts.vocab()));
        }
        assert!(sts.paths().vocab.ends_with("new_vocab.txt"));
        assert!(sts.paths().metadata.exists());
        assert!(sts.paths().w2v.ends_with("new_w2v.npy"));
        assert_eq!(sts.w2v().unwrap().dim(), (sts.vocab_size(), 4));
        assert_eq!(load_w2v(&sts.paths().w2v).unwrap().nrows(), sts.vocab_size());
    }

    #[test]
    fn test_named_vocabulary_is_loaded_after_rebuild() {
        let dir     = layout();
        let mut sts = Sts::new(dir.path(), StsOptions::default()).unwrap();
        let params  = VocabParams { min_frequency: 1, name: "full".into(), ..VocabParams::default() };
        sts.create_vocabulary(&params, None).unwrap();

        let opts  = StsOptions { vocab_name: Some("full".into()), ..StsOptions::default() };
        let named = Sts::new(dir.path(), opts).unwrap();
        assert_eq!(named.vocab_size(), sts.vocab_size());
        assert!(named.paths().vocab.ends_with("full_vocab.txt"));
    }

    #[test]
    fn test_existing_w2v_is_loaded() {
        let dir  = layout();
        let root = dir.path().join(DEFAULT_SUBSET);
        save_w2v(root.join("w2v.npy"), &Array2::zeros((5, 3))).unwrap();

        let sts = Sts::new(dir.path(), StsOptions::default()).unwrap();
        assert_eq!(sts.w2v().unwrap().dim(), (5, 3));
    }
}
