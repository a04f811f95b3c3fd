// ============================================================
// Layer 6 — Vocabulary Store
// ============================================================
// Rebuilds a vocabulary from the training corpus and persists
// it next to the dataset:
//
//   <dir>/<name>_vocab.txt     — one token per line, id = line
//   <dir>/<name>_metadata.txt  — same tokens, for the embedding
//                                projector tooling
//
// The corpus files are already tokenised by the external
// parser, so the only tokenizer is a whitespace split.

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    fs::{self, File},
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::data::vocabulary::{Vocabulary, RESERVED_TOKENS};
use crate::domain::error::DatasetError;

pub const WHITESPACE_TOKENIZER: &str = "whitespace";

/// Knobs of a vocabulary rebuild
#[derive(Debug, Clone)]
pub struct VocabParams {
    pub min_frequency:  usize,
    pub tokenizer:      String,
    /// Lowercase tokens while counting. Batches read against the
    /// result need `BatchOptions::downcase` as well, or capitalised
    /// tokens map to <UNK>.
    pub downcase:       bool,
    pub max_vocab_size: Option<usize>,
    pub name:           String,
}

impl Default for VocabParams {
    fn default() -> Self {
        Self {
            min_frequency:  5,
            tokenizer:      WHITESPACE_TOKENIZER.to_string(),
            downcase:       false,
            max_vocab_size: None,
            name:           "new".to_string(),
        }
    }
}

/// Where a rebuild wrote its files
#[derive(Debug, Clone)]
pub struct VocabArtifacts {
    pub vocab_path:    PathBuf,
    pub metadata_path: PathBuf,
}

pub struct VocabStore {
    dir: PathBuf,
}

impl VocabStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Count tokens over `files`, keep the frequent ones, save.
    pub fn build_and_save(&self, files: &[PathBuf], params: &VocabParams) -> Result<VocabArtifacts> {
        if params.tokenizer != WHITESPACE_TOKENIZER {
            return Err(DatasetError::NotImplemented(format!(
                "tokenizer '{}' is not available, only '{}'",
                params.tokenizer, WHITESPACE_TOKENIZER
            ))
            .into());
        }
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        // ── Step 1: Count token frequencies over both sentences ───────────────
        let mut freq: HashMap<String, usize> = HashMap::new();
        for file in files {
            count_tokens(file, params.downcase, &mut freq)?;
        }
        tracing::info!("Counted {} distinct tokens", freq.len());

        // ── Step 2: Filter, sort by frequency (ties alphabetically), cap ──────
        let mut words: Vec<(String, usize)> = freq
            .into_iter()
            .filter(|(w, n)| *n >= params.min_frequency && !RESERVED_TOKENS.contains(&w.as_str()))
            .collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        if let Some(max) = params.max_vocab_size {
            words.truncate(max.saturating_sub(RESERVED_TOKENS.len()));
        }

        // ── Step 3: Reserved tokens first, then the corpus words ──────────────
        let vocabulary = Vocabulary::from_tokens(
            RESERVED_TOKENS
                .iter()
                .map(|t| t.to_string())
                .chain(words.into_iter().map(|(w, _)| w)),
        );

        let vocab_path    = self.dir.join(format!("{}_vocab.txt", params.name));
        let metadata_path = self.dir.join(format!("{}_metadata.txt", params.name));
        vocabulary.save(&vocab_path)?;
        write_metadata(&metadata_path, &vocabulary)?;

        tracing::info!(
            "Vocabulary of {} tokens saved to '{}'",
            vocabulary.len(),
            vocab_path.display()
        );
        Ok(VocabArtifacts { vocab_path, metadata_path })
    }
}

fn count_tokens(path: &Path, downcase: bool, freq: &mut HashMap<String, usize>) -> Result<()> {
    let file = File::open(path).map_err(|e| DatasetError::resource(path, e))?;
    for line in BufReader::new(file).lines() {
        let line = line.with_context(|| format!("Cannot read '{}'", path.display()))?;
        // Only the two sentence columns carry tokens
        for sentence in line.split('\t').take(2) {
            for token in sentence.split_whitespace() {
                let token = if downcase { token.to_lowercase() } else { token.to_string() };
                *freq.entry(token).or_insert(0) += 1;
            }
        }
    }
    Ok(())
}

fn write_metadata(path: &Path, vocab: &Vocabulary) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Cannot write metadata to '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);
    for token in vocab.tokens() {
        writeln!(writer, "{token}")?;
    }
    writer.flush()?;
    Ok(())
}
