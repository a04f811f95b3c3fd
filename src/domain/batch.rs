// ============================================================
// Layer 3 — Batch Domain Types
// ============================================================
// A Batch is what the data layer hands to the model:
//
//   s1  — first sentence of every pair (ids or raw tokens)
//   s2  — second sentence of every pair, aligned with s1
//   sim — the similarity score of every pair, already rescaled
//
// All three always have the same length. A Batch is built once
// by the split that read it and is never mutated afterwards.
//
// BatchOptions carries every knob of a batch request, and
// ScoreRange is the closed interval used by the rescaler.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::domain::error::DatasetError;

// ─── ScoreRange ──────────────────────────────────────────────────────────────
/// A closed numeric interval `[lo, hi]` with `lo < hi`.
///
/// The only way to build one is through a validating constructor,
/// so a ScoreRange in hand is always a valid rescale source/target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct ScoreRange {
    lo: f64,
    hi: f64,
}

impl ScoreRange {
    /// The native range of every similarity score in the dataset files
    pub const UNIT: ScoreRange = ScoreRange { lo: 0.0, hi: 1.0 };

    pub fn new(lo: f64, hi: f64) -> Result<Self, DatasetError> {
        if !lo.is_finite() || !hi.is_finite() {
            return Err(DatasetError::Validation(format!(
                "rescale range bounds must be finite, got ({lo}, {hi})"
            )));
        }
        if lo >= hi {
            return Err(DatasetError::Validation(format!(
                "rescale range must be ascending with non-zero width, got ({lo}, {hi})"
            )));
        }
        if !(hi - lo).is_finite() {
            return Err(DatasetError::Validation(format!(
                "rescale range width overflows, got ({lo}, {hi})"
            )));
        }
        Ok(Self { lo, hi })
    }

    pub fn lo(&self) -> f64 { self.lo }

    pub fn hi(&self) -> f64 { self.hi }

    pub fn width(&self) -> f64 { self.hi - self.lo }
}

impl TryFrom<&[f64]> for ScoreRange {
    type Error = DatasetError;

    fn try_from(bounds: &[f64]) -> Result<Self, Self::Error> {
        match bounds {
            [lo, hi] => ScoreRange::new(*lo, *hi),
            _ => Err(DatasetError::Validation(format!(
                "rescale range needs exactly 2 elements, got {}",
                bounds.len()
            ))),
        }
    }
}

impl TryFrom<Vec<f64>> for ScoreRange {
    type Error = DatasetError;

    fn try_from(bounds: Vec<f64>) -> Result<Self, Self::Error> {
        ScoreRange::try_from(bounds.as_slice())
    }
}

impl From<ScoreRange> for Vec<f64> {
    fn from(r: ScoreRange) -> Self {
        vec![r.lo, r.hi]
    }
}

/// Parses `"lo,hi"`, e.g. `--rescale 0,5` on the command line
impl FromStr for ScoreRange {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bounds = s
            .split(',')
            .map(|part| {
                part.trim().parse::<f64>().map_err(|e| {
                    DatasetError::Validation(format!("bad rescale bound '{part}': {e}"))
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;
        ScoreRange::try_from(bounds.as_slice())
    }
}

impl fmt::Display for ScoreRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lo, self.hi)
    }
}

// ─── BatchOptions ────────────────────────────────────────────────────────────
/// Everything that shapes one `next_batch` request.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Number of sentence pairs per batch
    pub batch_size: usize,
    /// Prefix every sentence with the begin marker
    pub seq_begin: bool,
    /// Suffix every sentence with the end marker
    pub seq_end: bool,
    /// Target range of the similarity scores
    pub rescale: ScoreRange,
    /// Pad/truncate every sentence to this length; 0 disables padding
    pub pad: usize,
    /// Keep tokens as strings instead of converting them to ids
    pub raw: bool,
    /// Keep named-entity placeholder tokens
    pub keep_entities: bool,
    /// Lowercase tokens before the vocabulary lookup; set it when the
    /// vocabulary was built with downcasing
    pub downcase: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size:    64,
            seq_begin:     false,
            seq_end:       false,
            rescale:       ScoreRange::UNIT,
            pad:           0,
            raw:           false,
            keep_entities: false,
            downcase:      false,
        }
    }
}

// ─── Sentences ───────────────────────────────────────────────────────────────
/// One side of a batch: either vocabulary ids or raw tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum Sentences {
    Ids(Vec<Vec<usize>>),
    Tokens(Vec<Vec<String>>),
}

impl Sentences {
    pub fn len(&self) -> usize {
        match self {
            Sentences::Ids(seqs)    => seqs.len(),
            Sentences::Tokens(seqs) => seqs.len(),
        }
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_ids(&self) -> Option<&[Vec<usize>]> {
        match self {
            Sentences::Ids(seqs) => Some(seqs),
            Sentences::Tokens(_) => None,
        }
    }

    pub fn as_tokens(&self) -> Option<&[Vec<String>]> {
        match self {
            Sentences::Tokens(seqs) => Some(seqs),
            Sentences::Ids(_)       => None,
        }
    }
}

// ─── Batch ───────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    s1:  Sentences,
    s2:  Sentences,
    sim: Vec<f64>,
}

impl Batch {
    /// Fails if the three sequences do not have the same length
    pub fn new(s1: Sentences, s2: Sentences, sim: Vec<f64>) -> Result<Self, DatasetError> {
        if s1.len() != s2.len() || s1.len() != sim.len() {
            return Err(DatasetError::Validation(format!(
                "batch sequences are not aligned: s1={}, s2={}, sim={}",
                s1.len(),
                s2.len(),
                sim.len()
            )));
        }
        Ok(Self { s1, s2, sim })
    }

    pub fn s1(&self) -> &Sentences { &self.s1 }

    pub fn s2(&self) -> &Sentences { &self.s2 }

    pub fn sim(&self) -> &[f64] { &self.sim }

    #[cfg(test)]
    pub fn len(&self) -> usize { self.sim.len() }

    pub fn is_empty(&self) -> bool { self.sim.is_empty() }

    #[cfg(test)]
    pub fn is_raw(&self) -> bool {
        matches!(self.s1, Sentences::Tokens(_))
    }
}
