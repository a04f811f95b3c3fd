// ============================================================
// Layer 6 — Embedding Matrix Store
// ============================================================
// The word vectors of a dataset live next to its vocabulary as
// a float32 `.npy` matrix of shape [vocab_size, dim], row i
// being the vector of vocabulary id i.
//
// preload_w2v builds a fresh matrix for a rebuilt vocabulary:
//
//   1. every row drawn from U(-0.25, 0.25) with a seeded rng
//   2. the <PAD> row set to zero
//   3. rows of words found in a GloVe-format text file
//      ("word v1 v2 ... vd" per line) overwritten with those
//      pretrained vectors

use anyhow::{bail, Context, Result};
use ndarray::{Array2, ArrayView1};
use ndarray_npy::{read_npy, write_npy};
use ndarray_rand::{rand_distr::Uniform, RandomExt};
use rand::{rngs::StdRng, SeedableRng};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use crate::data::vocabulary::Vocabulary;

/// Half-width of the uniform init for words without a pretrained vector
pub const INIT_SCALE: f32 = 0.25;

pub fn load_w2v(path: impl AsRef<Path>) -> Result<Array2<f32>> {
    let path = path.as_ref();
    let w2v: Array2<f32> = read_npy(path)
        .with_context(|| format!("Cannot read embedding matrix '{}'", path.display()))?;
    tracing::debug!("Loaded w2v {:?} from '{}'", w2v.dim(), path.display());
    Ok(w2v)
}

pub fn save_w2v(path: impl AsRef<Path>, w2v: &Array2<f32>) -> Result<()> {
    let path = path.as_ref();
    write_npy(path, w2v)
        .with_context(|| format!("Cannot write embedding matrix '{}'", path.display()))?;
    tracing::debug!("Saved w2v {:?} to '{}'", w2v.dim(), path.display());
    Ok(())
}

/// Random matrix for `vocab`, overwritten with pretrained rows where available.
pub fn preload_w2v(
    vocab:      &Vocabulary,
    dim:        usize,
    pretrained: Option<&Path>,
    seed:       u64,
) -> Result<Array2<f32>> {
    if dim == 0 {
        bail!("Embedding dimension must be positive");
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut w2v = Array2::random_using(
        (vocab.len(), dim),
        Uniform::new(-INIT_SCALE, INIT_SCALE),
        &mut rng,
    );
    w2v.row_mut(vocab.pad_id()).fill(0.0);

    let Some(path) = pretrained else {
        return Ok(w2v);
    };

    let file = File::open(path)
        .with_context(|| format!("Cannot open pretrained vectors '{}'", path.display()))?;
    let mut hits = 0usize;
    for line in BufReader::new(file).lines() {
        let line = line.with_context(|| format!("Cannot read '{}'", path.display()))?;
        let mut fields = line.split_whitespace();
        let Some(word) = fields.next() else { continue };
        let Some(id) = vocab.get(word) else { continue };

        let values = match fields.map(str::parse::<f32>).collect::<Result<Vec<_>, _>>() {
            Ok(v) => v,
            Err(_) => {
                tracing::debug!("Skipping unparsable vector for '{}'", word);
                continue;
            }
        };
        if values.len() != dim {
            tracing::debug!("Skipping '{}': {} values, expected {}", word, values.len(), dim);
            continue;
        }
        w2v.row_mut(id).assign(&ArrayView1::from(&values[..]));
        hits += 1;
    }

    tracing::info!(
        "Pretrained vectors found for {}/{} vocabulary entries",
        hits,
        vocab.len()
    );
    Ok(w2v)
}
