// ============================================================
// Layer 2 — BuildVocabUseCase
// ============================================================
// Rebuilds the vocabulary of a dataset subset from its training
// split and, optionally, a fresh embedding matrix for it:
//
//   <subset>/<name>_vocab.txt
//   <subset>/<name>_metadata.txt
//   <subset>/<name>_w2v.npy        (with an embedding dim)
//
// Train on the result with `--vocab-name <name>`.
//
// A subset that has never had a vocabulary gets a vocab.txt with
// only the reserved tokens first, so the dataset group can be
// opened at all.

use anyhow::Result;
use std::path::PathBuf;

use crate::data::{
    sts::{EmbeddingInit, Sts, StsOptions, StsPaths},
    vocabulary::{Vocabulary, RESERVED_TOKENS},
};
use crate::domain::error::DatasetError;
use crate::infra::vocab_store::VocabParams;

#[derive(Debug, Clone)]
pub struct BuildVocabRequest {
    pub dataset:    String,
    pub data_dir:   String,
    pub subset:     String,
    pub params:     VocabParams,
    pub embeddings: Option<EmbeddingInit>,
}

/// Files and size of the rebuilt vocabulary
#[derive(Debug, Clone)]
pub struct BuildVocabOutcome {
    pub vocab_size: usize,
    pub vocab_path: PathBuf,
    pub w2v_path:   Option<PathBuf>,
}

pub struct BuildVocabUseCase {
    request: BuildVocabRequest,
}

impl BuildVocabUseCase {
    pub fn new(request: BuildVocabRequest) -> Self {
        Self { request }
    }

    pub fn execute(&self) -> Result<BuildVocabOutcome> {
        let req = &self.request;
        if req.dataset != Sts::NAME {
            return Err(DatasetError::NotImplemented(format!(
                "dataset '{}' has not been implemented; available: {}",
                req.dataset,
                Sts::NAME
            ))
            .into());
        }

        let paths = StsPaths::new(&req.data_dir, &req.subset, None);
        if !paths.vocab.exists() {
            tracing::warn!(
                "No vocabulary at '{}'; seeding it with the reserved tokens",
                paths.vocab.display()
            );
            Vocabulary::from_tokens(RESERVED_TOKENS).save(&paths.vocab)?;
        }

        let mut sts = Sts::new(
            &req.data_dir,
            StsOptions { subset: req.subset.clone(), ..StsOptions::default() },
        )?;
        sts.create_vocabulary(&req.params, req.embeddings.as_ref())?;

        Ok(BuildVocabOutcome {
            vocab_size: sts.vocab_size(),
            vocab_path: sts.paths().vocab.clone(),
            w2v_path:   req.embeddings.as_ref().map(|_| sts.paths().w2v.clone()),
        })
    }
}
