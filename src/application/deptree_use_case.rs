// ============================================================
// Layer 2 — DepTreeUseCase
// ============================================================
// Converts dependency-parser output (CoNLL-U) into the token
// files the splits read.
//
//   no score file  → one linearised sentence per line
//   score file     → sentences 2k and 2k+1 paired with score k:
//                    "<s1>\t<s2>\t<score>"
//
// The score file holds one float per line, blank lines ignored.

use anyhow::{Context, Result};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::data::deptree::read_conll;
use crate::domain::error::DatasetError;

pub struct DepTreeUseCase {
    input:     PathBuf,
    output:    PathBuf,
    scores:    Option<PathBuf>,
    lemmatize: bool,
}

impl DepTreeUseCase {
    pub fn new(
        input:     impl Into<PathBuf>,
        output:    impl Into<PathBuf>,
        scores:    Option<PathBuf>,
        lemmatize: bool,
    ) -> Self {
        Self { input: input.into(), output: output.into(), scores, lemmatize }
    }

    /// Returns the number of lines written.
    pub fn execute(&self) -> Result<usize> {
        // ── Step 1: Parse the CoNLL-U input ──────────────────────────────────
        let file = File::open(&self.input).map_err(|e| DatasetError::resource(&self.input, e))?;
        let sentences = read_conll(BufReader::new(file))?;
        tracing::info!(
            "Read {} parsed sentences from '{}'",
            sentences.len(),
            self.input.display()
        );

        let rendered: Vec<String> = sentences
            .iter()
            .map(|s| s.linearize(self.lemmatize).map(|t| t.join(" ")))
            .collect::<Result<_, _>>()?;

        // ── Step 2: Pair with scores when given ──────────────────────────────
        let lines: Vec<String> = match &self.scores {
            None => rendered,
            Some(path) => {
                let scores = read_scores(path)?;
                if rendered.len() != 2 * scores.len() {
                    return Err(DatasetError::Validation(format!(
                        "{} sentences cannot be paired with {} scores",
                        rendered.len(),
                        scores.len()
                    ))
                    .into());
                }
                rendered
                    .chunks(2)
                    .zip(&scores)
                    .map(|(pair, score)| format!("{}\t{}\t{score}", pair[0], pair[1]))
                    .collect()
            }
        };

        // ── Step 3: Write ────────────────────────────────────────────────────
        if let Some(parent) = self.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }
        let file = File::create(&self.output).map_err(|e| DatasetError::resource(&self.output, e))?;
        let mut writer = BufWriter::new(file);
        for line in &lines {
            writeln!(writer, "{line}")
                .with_context(|| format!("Cannot write '{}'", self.output.display()))?;
        }
        writer.flush()?;

        tracing::info!("Wrote {} lines to '{}'", lines.len(), self.output.display());
        Ok(lines.len())
    }
}

fn read_scores(path: &Path) -> Result<Vec<f64>> {
    let text = fs::read_to_string(path).map_err(|e| DatasetError::resource(path, e))?;
    text.lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(i, l)| {
            l.trim().parse::<f64>().map_err(|_| {
                anyhow::Error::from(DatasetError::Validation(format!(
                    "'{}' line {}: '{}' is not a score",
                    path.display(),
                    i + 1,
                    l.trim()
                )))
            })
        })
        .collect()
}
