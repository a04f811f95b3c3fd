// ============================================================
// Layer 4 — Sequence Encoder
// ============================================================
// Turns token sequences into what the model consumes:
//
//   encode_ids — tokens → vocabulary ids (<UNK> fallback),
//                optionally wrapped in <GO> … <EOS> ids
//   encode_raw — tokens stay strings, optionally wrapped in
//                literal <GO> … <EOS> tokens
//   pad_to     — right-pad with the pad value or truncate so
//                every sequence has exactly `len` elements
//
// Markers are added before padding, so a sentence longer than
// the pad length loses its end marker to truncation.

use crate::data::vocabulary::{Vocabulary, EOS_TOKEN, GO_TOKEN};

pub struct SequenceEncoder<'a> {
    vocab:     &'a Vocabulary,
    seq_begin: bool,
    seq_end:   bool,
}

impl<'a> SequenceEncoder<'a> {
    pub fn new(vocab: &'a Vocabulary, seq_begin: bool, seq_end: bool) -> Self {
        Self { vocab, seq_begin, seq_end }
    }

    pub fn encode_ids(&self, tokens: &[String]) -> Vec<usize> {
        let mut ids = Vec::with_capacity(tokens.len() + 2);
        if self.seq_begin {
            ids.push(self.vocab.go_id());
        }
        ids.extend(tokens.iter().map(|t| self.vocab.id(t)));
        if self.seq_end {
            ids.push(self.vocab.eos_id());
        }
        ids
    }

    pub fn encode_raw(&self, tokens: Vec<String>) -> Vec<String> {
        let mut out = Vec::with_capacity(tokens.len() + 2);
        if self.seq_begin {
            out.push(GO_TOKEN.to_string());
        }
        out.extend(tokens);
        if self.seq_end {
            out.push(EOS_TOKEN.to_string());
        }
        out
    }

    pub fn encode_all_ids(&self, sentences: &[Vec<String>]) -> Vec<Vec<usize>> {
        sentences.iter().map(|s| self.encode_ids(s)).collect()
    }

    pub fn encode_all_raw(&self, sentences: Vec<Vec<String>>) -> Vec<Vec<String>> {
        sentences.into_iter().map(|s| self.encode_raw(s)).collect()
    }
}

/// Truncate or right-pad every sequence to exactly `len` elements
pub fn pad_to<T: Clone>(sequences: Vec<Vec<T>>, len: usize, pad: T) -> Vec<Vec<T>> {
    sequences
        .into_iter()
        .map(|mut seq| {
            seq.truncate(len);
            seq.resize(len, pad.clone());
            seq
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::vocabulary::PAD_TOKEN;

    fn vocab() -> Vocabulary {
        Vocabulary::from_tokens(["<PAD>", "<UNK>", "<GO>", "<EOS>", "the", "cat", "sat"])
    }

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_ids_without_markers() {
        let v   = vocab();
        let enc = SequenceEncoder::new(&v, false, false);
        assert_eq!(enc.encode_ids(&toks("the cat sat")), vec![4, 5, 6]);
    }

    #[test]
    fn test_ids_with_markers_and_unknowns() {
        let v   = vocab();
        let enc = SequenceEncoder::new(&v, true, true);
        assert_eq!(enc.encode_ids(&toks("the dog")), vec![2, 4, 1, 3]);
    }

    #[test]
    fn test_raw_keeps_strings_with_literal_markers() {
        let v   = vocab();
        let enc = SequenceEncoder::new(&v, true, false);
        assert_eq!(enc.encode_raw(toks("the dog")), toks("<GO> the dog"));
    }

    #[test]
    fn test_pad_to_pads_and_truncates() {
        let out = pad_to(vec![vec![1, 2], vec![1, 2, 3, 4, 5, 6], vec![]], 4, 0);
        assert_eq!(out, vec![vec![1, 2, 0, 0], vec![1, 2, 3, 4], vec![0, 0, 0, 0]]);
        assert!(out.iter().all(|s| s.len() == 4));
    }

    #[test]
    fn test_truncation_can_drop_end_marker() {
        let v   = vocab();
        let enc = SequenceEncoder::new(&v, false, true);
        let out = pad_to(vec![enc.encode_raw(toks("the cat sat"))], 3, PAD_TOKEN.to_string());
        assert_eq!(out[0], toks("the cat sat"));
    }
}
