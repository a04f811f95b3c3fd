// ============================================================
// Layer 4 — Vocabulary Store
// ============================================================
// A bidirectional token ↔ id mapping loaded from a plain text
// file with one token per line. The id of a token is its
// zero-based line number.
//
// Four reserved tokens are always present:
//   <PAD> — padding
//   <UNK> — fallback for out-of-vocabulary tokens
//   <GO>  — begin-of-sequence marker
//   <EOS> — end-of-sequence marker
//
// A rebuilt vocabulary (infra::vocab_store) writes them first,
// so <PAD> is id 0. Older vocabulary files that lack them get
// the missing ones appended after the last line.
//
// One Vocabulary is loaded per dataset group and shared by all
// splits through an Arc; it is never mutated after loading.

use std::{
    collections::HashMap,
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};

use crate::domain::error::DatasetError;

pub const PAD_TOKEN: &str = "<PAD>";
pub const UNK_TOKEN: &str = "<UNK>";
pub const GO_TOKEN:  &str = "<GO>";
pub const EOS_TOKEN: &str = "<EOS>";

/// Reserved tokens in the order a fresh vocabulary lists them
pub const RESERVED_TOKENS: [&str; 4] = [PAD_TOKEN, UNK_TOKEN, GO_TOKEN, EOS_TOKEN];

#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    w2i:    HashMap<String, usize>,
    i2w:    Vec<String>,
    pad_id: usize,
    unk_id: usize,
    go_id:  usize,
    eos_id: usize,
}

impl Vocabulary {
    /// Load a vocabulary file, one token per line.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| DatasetError::resource(path, e))?;

        let vocab = Self::from_tokens(text.lines().map(|l| l.trim_end_matches('\r')));
        tracing::debug!(
            "Loaded vocabulary of {} tokens from '{}'",
            vocab.len(),
            path.display()
        );
        Ok(vocab)
    }

    /// Build a vocabulary from tokens listed in id order.
    /// Reserved tokens missing from the list are appended.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut w2i = HashMap::new();
        let mut i2w = Vec::new();

        for (id, token) in tokens.into_iter().enumerate() {
            let token = token.into();
            // Duplicate lines keep the first id for lookups
            w2i.entry(token.clone()).or_insert(id);
            i2w.push(token);
        }

        for reserved in RESERVED_TOKENS {
            if !w2i.contains_key(reserved) {
                tracing::warn!(
                    "Vocabulary has no '{}' token, appending it with id {}",
                    reserved,
                    i2w.len()
                );
                w2i.insert(reserved.to_string(), i2w.len());
                i2w.push(reserved.to_string());
            }
        }

        // Every reserved token is in w2i at this point
        let pad_id = w2i[PAD_TOKEN];
        let unk_id = w2i[UNK_TOKEN];
        let go_id  = w2i[GO_TOKEN];
        let eos_id = w2i[EOS_TOKEN];

        Self { w2i, i2w, pad_id, unk_id, go_id, eos_id }
    }

    /// Write the vocabulary back to disk, one token per line
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DatasetError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| DatasetError::resource(path, e))?;
        let mut writer = BufWriter::new(file);
        for token in &self.i2w {
            writeln!(writer, "{token}").map_err(|e| DatasetError::resource(path, e))?;
        }
        writer.flush().map_err(|e| DatasetError::resource(path, e))
    }

    /// Id of `token`, falling back to the <UNK> id
    pub fn id(&self, token: &str) -> usize {
        self.w2i.get(token).copied().unwrap_or(self.unk_id)
    }

    /// Id of `token` if it is in the vocabulary
    pub fn get(&self, token: &str) -> Option<usize> {
        self.w2i.get(token).copied()
    }

    #[cfg(test)]
    pub fn contains(&self, token: &str) -> bool {
        self.w2i.contains_key(token)
    }

    /// Reverse lookup
    pub fn token(&self, id: usize) -> Option<&str> {
        self.i2w.get(id).map(String::as_str)
    }

    /// Turn ids back into a space separated sentence, skipping padding.
    /// Unknown ids render as <UNK>.
    pub fn decode(&self, ids: &[usize]) -> String {
        ids.iter()
            .filter(|&&id| id != self.pad_id)
            .map(|&id| self.token(id).unwrap_or(UNK_TOKEN))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn tokens(&self) -> &[String] { &self.i2w }

    pub fn len(&self) -> usize { self.i2w.len() }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool { self.i2w.is_empty() }

    pub fn pad_id(&self) -> usize { self.pad_id }

    #[cfg(test)]
    pub fn unk_id(&self) -> usize { self.unk_id }

    pub fn go_id(&self) -> usize { self.go_id }

    pub fn eos_id(&self) -> usize { self.eos_id }
}
