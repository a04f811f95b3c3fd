// ============================================================
// Layer 4 — Dataset Split / Record Source
// ============================================================
// One split (train, validation or test) of a sentence-pair
// dataset. The split streams its tab separated file:
//
//   <sentence-1 tokens>\t<sentence-2 tokens>\t<similarity>
//
// and cycles over it forever. Every time the reader crosses
// the end of the file the epoch counter goes up by one and the
// reader seeks back to the start, so a batch never stops at an
// epoch boundary; the caller sees wraparound only through
// `epochs_completed()`.
//
// Reading is an explicit little state machine:
//
//   Reading ──(no more bytes)──► AtEof ──► Rewinding ──► Reading
//
// AtEof is entered both when a read returns nothing and right
// after the last row of the file has been consumed, so a batch
// that ends exactly on the last row already reports the new
// epoch. A pass that yields no rows at all is an error instead
// of an endless loop.
//
// Lifecycle: constructed closed → open() → next_batch()… → close().
// `session()` gives a guard that closes the split when dropped.

use std::{
    fs::File,
    io::{BufRead, BufReader, Seek, SeekFrom},
    ops::{Deref, DerefMut},
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::data::{
    encoder::{pad_to, SequenceEncoder},
    entities::remove_entities,
    rescale::rescale,
    vocabulary::{Vocabulary, PAD_TOKEN},
};
use crate::domain::{
    batch::{Batch, BatchOptions, ScoreRange, Sentences},
    error::DatasetError,
};

/// Native range of the similarity column in the dataset files
pub const NATIVE_RANGE: ScoreRange = ScoreRange::UNIT;

// ─── BatchSource ─────────────────────────────────────────────────────────────
/// Anything the drivers can pull batches from.
pub trait BatchSource {
    fn next_batch(&mut self, options: &BatchOptions) -> Result<Batch, DatasetError>;
    fn epochs_completed(&self) -> usize;
    fn vocabulary(&self) -> &Vocabulary;
}

/// One parsed line of a dataset file
#[derive(Debug, Clone, PartialEq)]
pub struct SentencePair {
    pub s1:  Vec<String>,
    pub s2:  Vec<String>,
    pub sim: f64,
}

impl SentencePair {
    /// Parse `s1\ts2\tsim`. Sentences are whitespace tokenised.
    pub fn parse(line: &str) -> Result<Self, String> {
        let cols: Vec<&str> = line.trim().split('\t').collect();
        if cols.len() != 3 {
            return Err(format!("expected 3 tab-separated fields, found {}", cols.len()));
        }
        let sim = cols[2]
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("bad similarity '{}': {e}", cols[2]))?;
        Ok(Self {
            s1: cols[0].split_whitespace().map(String::from).collect(),
            s2: cols[1].split_whitespace().map(String::from).collect(),
            sim,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    Reading,
    AtEof,
    Rewinding,
}

// ─── DataSplit ───────────────────────────────────────────────────────────────
pub struct DataSplit {
    path:             PathBuf,
    vocab:            Arc<Vocabulary>,
    epochs_completed: usize,
    reader:           Option<BufReader<File>>,
    /// Rows read since the last rewind (or since open)
    rows_in_pass:     usize,
    /// 1-based line number of the last line read, for error messages
    line_no:          usize,
}

impl DataSplit {
    pub fn new(path: impl Into<PathBuf>, vocab: Arc<Vocabulary>) -> Self {
        Self {
            path:             path.into(),
            vocab,
            epochs_completed: 0,
            reader:           None,
            rows_in_pass:     0,
            line_no:          0,
        }
    }

    /// Acquire the file handle. Opening twice without closing is a
    /// programming error.
    pub fn open(&mut self) -> Result<(), DatasetError> {
        if self.reader.is_some() {
            return Err(DatasetError::Usage(format!(
                "dataset '{}' is already open; call close() first",
                self.path.display()
            )));
        }
        let file = File::open(&self.path)
            .map_err(|e| DatasetError::resource(&self.path, e))?;
        self.reader       = Some(BufReader::new(file));
        self.rows_in_pass = 0;
        self.line_no      = 0;
        tracing::debug!("Opened dataset '{}'", self.path.display());
        Ok(())
    }

    /// Release the file handle
    pub fn close(&mut self) {
        if self.reader.take().is_some() {
            tracing::debug!("Closed dataset '{}'", self.path.display());
        } else {
            tracing::debug!("close() on dataset '{}' that was not open", self.path.display());
        }
    }

    /// Open the split for the lifetime of the returned guard
    pub fn session(&mut self) -> Result<OpenSplit<'_>, DatasetError> {
        self.open()?;
        Ok(OpenSplit { split: self })
    }

    #[cfg(test)]
    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    pub fn set_vocab(&mut self, vocab: Arc<Vocabulary>) {
        self.vocab = vocab;
    }

    #[cfg(test)]
    pub fn vocab(&self) -> &Arc<Vocabulary> {
        &self.vocab
    }

    pub fn epochs_completed(&self) -> usize {
        self.epochs_completed
    }

    /// Assemble the next batch. See the module header for the cycling rules.
    pub fn next_batch(&mut self, options: &BatchOptions) -> Result<Batch, DatasetError> {
        if self.reader.is_none() {
            return Err(DatasetError::Usage(
                "The dataset needs to be open before being used. \
                 Please call dataset.open() before calling dataset.next_batch()"
                    .to_string(),
            ));
        }
        if options.batch_size == 0 {
            return Err(DatasetError::Validation("batch_size must be at least 1".to_string()));
        }

        // ── Step 1: Read batch_size rows, cycling over the file ───────────────
        let mut s1s  = Vec::with_capacity(options.batch_size);
        let mut s2s  = Vec::with_capacity(options.batch_size);
        let mut sims = Vec::with_capacity(options.batch_size);
        while sims.len() < options.batch_size {
            let pair = self.next_row()?;
            s1s.push(pair.s1);
            s2s.push(pair.s2);
            sims.push(pair.sim);
        }

        // ── Step 2: Strip entity placeholders, then lowercase ─────────────────
        if !options.keep_entities {
            s1s = remove_entities(s1s);
            s2s = remove_entities(s2s);
        }

        if options.downcase {
            for tokens in s1s.iter_mut().chain(s2s.iter_mut()) {
                for t in tokens.iter_mut() {
                    *t = t.to_lowercase();
                }
            }
        }

        // ── Steps 3 + 4: Encode and pad ───────────────────────────────────────
        let encoder = SequenceEncoder::new(&self.vocab, options.seq_begin, options.seq_end);
        let (s1, s2) = if options.raw {
            let mut a = encoder.encode_all_raw(s1s);
            let mut b = encoder.encode_all_raw(s2s);
            if options.pad != 0 {
                a = pad_to(a, options.pad, PAD_TOKEN.to_string());
                b = pad_to(b, options.pad, PAD_TOKEN.to_string());
            }
            (Sentences::Tokens(a), Sentences::Tokens(b))
        } else {
            let mut a = encoder.encode_all_ids(&s1s);
            let mut b = encoder.encode_all_ids(&s2s);
            if options.pad != 0 {
                a = pad_to(a, options.pad, self.vocab.pad_id());
                b = pad_to(b, options.pad, self.vocab.pad_id());
            }
            (Sentences::Ids(a), Sentences::Ids(b))
        };

        // ── Step 5: Rescale from the native range ─────────────────────────────
        let sim = rescale(&sims, NATIVE_RANGE, options.rescale);

        Batch::new(s1, s2, sim)
    }

    /// Read the next valid row, rewinding at end of file.
    fn next_row(&mut self) -> Result<SentencePair, DatasetError> {
        let path   = &self.path;
        let reader = self.reader.as_mut().ok_or_else(|| {
            DatasetError::Usage(format!("dataset '{}' is not open", path.display()))
        })?;

        let mut buf   = Vec::new();
        let mut state = ReadState::Reading;

        loop {
            match state {
                ReadState::Reading => {
                    buf.clear();
                    let n = reader
                        .read_until(b'\n', &mut buf)
                        .map_err(|e| DatasetError::resource(path, e))?;
                    if n == 0 {
                        state = ReadState::AtEof;
                        continue;
                    }
                    self.line_no += 1;
                    let line = std::str::from_utf8(&buf).map_err(|e| {
                        DatasetError::Validation(format!(
                            "{}:{}: row is not valid UTF-8 ({e})",
                            path.display(),
                            self.line_no
                        ))
                    })?;
                    if line.trim().is_empty() {
                        continue;
                    }

                    let pair = SentencePair::parse(line).map_err(|msg| {
                        DatasetError::Validation(format!(
                            "{}:{}: {msg}",
                            path.display(),
                            self.line_no
                        ))
                    })?;
                    self.rows_in_pass += 1;

                    // Cross the boundary right away when this was the last row
                    let at_end = reader
                        .fill_buf()
                        .map_err(|e| DatasetError::resource(path, e))?
                        .is_empty();
                    if at_end {
                        self.epochs_completed += 1;
                        Self::rewind(reader, path)?;
                        self.rows_in_pass = 0;
                        self.line_no      = 0;
                    }
                    return Ok(pair);
                }
                ReadState::AtEof => {
                    if self.rows_in_pass == 0 {
                        return Err(DatasetError::Empty(path.clone()));
                    }
                    state = ReadState::Rewinding;
                }
                ReadState::Rewinding => {
                    self.epochs_completed += 1;
                    Self::rewind(reader, path)?;
                    self.rows_in_pass = 0;
                    self.line_no      = 0;
                    state = ReadState::Reading;
                }
            }
        }
    }

    fn rewind(reader: &mut BufReader<File>, path: &Path) -> Result<(), DatasetError> {
        reader
            .seek(SeekFrom::Start(0))
            .map(|_| ())
            .map_err(|e| DatasetError::resource(path, e))
    }
}

impl BatchSource for DataSplit {
    fn next_batch(&mut self, options: &BatchOptions) -> Result<Batch, DatasetError> {
        DataSplit::next_batch(self, options)
    }

    fn epochs_completed(&self) -> usize {
        self.epochs_completed
    }

    fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }
}

// ─── OpenSplit ───────────────────────────────────────────────────────────────
/// Scoped handle: the split stays open while this guard lives.
pub struct OpenSplit<'a> {
    split: &'a mut DataSplit,
}

impl Deref for OpenSplit<'_> {
    type Target = DataSplit;

    fn deref(&self) -> &DataSplit {
        self.split
    }
}

impl DerefMut for OpenSplit<'_> {
    fn deref_mut(&mut self) -> &mut DataSplit {
        self.split
    }
}

impl Drop for OpenSplit<'_> {
    fn drop(&mut self) {
        self.split.close();
    }
}

impl BatchSource for OpenSplit<'_> {
    fn next_batch(&mut self, options: &BatchOptions) -> Result<Batch, DatasetError> {
        self.split.next_batch(options)
    }

    fn epochs_completed(&self) -> usize {
        self.split.epochs_completed()
    }

    fn vocabulary(&self) -> &Vocabulary {
        &self.split.vocab
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn vocab() -> Arc<Vocabulary> {
        Arc::new(Vocabulary::from_tokens([
            "<PAD>", "<UNK>", "<GO>", "<EOS>", "the", "cat", "sat", "dog", "ran", "eats",
        ]))
    }

    fn split_with(lines: &str) -> (TempDir, DataSplit) {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("dep_train.txt");
        fs::write(&path, lines).unwrap();
        (dir, DataSplit::new(path, vocab()))
    }

    fn opts(batch_size: usize) -> BatchOptions {
        BatchOptions { batch_size, ..BatchOptions::default() }
    }

    #[test]
    fn test_next_batch_before_open_is_usage_error() {
        let (_dir, mut split) = split_with("the cat sat\tthe dog ran\t0.8\n");
        let err = split.next_batch(&opts(1)).unwrap_err();
        assert!(matches!(err, DatasetError::Usage(_)));
        assert!(err.to_string().contains("open"));
    }

    #[test]
    fn test_open_missing_file_is_resource_error() {
        let mut split = DataSplit::new("/definitely/not/here.txt", vocab());
        assert!(matches!(split.open(), Err(DatasetError::Resource { .. })));
    }

    #[test]
    fn test_reopen_without_close_is_usage_error() {
        let (_dir, mut split) = split_with("the cat sat\tthe dog ran\t0.8\n");
        split.open().unwrap();
        assert!(matches!(split.open(), Err(DatasetError::Usage(_))));
        split.close();
        assert!(split.open().is_ok());
    }

    #[test]
    fn test_single_row_example() {
        let (_dir, mut split) = split_with("the cat sat\tthe dog ran\t0.8\n");
        split.open().unwrap();
        let options = BatchOptions {
            batch_size: 1,
            pad:        5,
            rescale:    ScoreRange::new(0.0, 5.0).unwrap(),
            ..BatchOptions::default()
        };
        let batch = split.next_batch(&options).unwrap();

        assert_eq!(batch.s1(), &Sentences::Ids(vec![vec![4, 5, 6, 0, 0]]));
        assert_eq!(batch.s2(), &Sentences::Ids(vec![vec![4, 7, 8, 0, 0]]));
        assert_eq!(batch.sim().len(), 1);
        assert!((batch.sim()[0] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_full_epoch_when_batch_divides_rows() {
        let rows = "the\tcat\t0.1\nsat\tdog\t0.2\nran\teats\t0.3\ncat\tthe\t0.4\n";
        let (_dir, mut split) = split_with(rows);
        split.open().unwrap();

        let mut seen = Vec::new();
        for _ in 0..2 {
            let batch = split.next_batch(&opts(2)).unwrap();
            seen.extend_from_slice(batch.sim());
        }
        assert_eq!(split.epochs_completed(), 1);
        assert_eq!(seen, vec![0.1, 0.2, 0.3, 0.4]);

        // The next batch starts over from the first row
        let again = split.next_batch(&opts(2)).unwrap();
        assert_eq!(again.sim(), &[0.1, 0.2]);
        assert_eq!(split.epochs_completed(), 1);
    }

    #[test]
    fn test_batch_spanning_the_boundary_revisits_rows() {
        let rows = "the\tcat\t0.1\nsat\tdog\t0.2\nran\teats\t0.3\n";
        let (_dir, mut split) = split_with(rows);
        split.open().unwrap();

        let first  = split.next_batch(&opts(2)).unwrap();
        let second = split.next_batch(&opts(2)).unwrap();
        assert_eq!(first.sim(), &[0.1, 0.2]);
        assert_eq!(second.sim(), &[0.3, 0.1]);
        assert_eq!(split.epochs_completed(), 1);
    }

    #[test]
    fn test_batch_larger_than_file_wraps_several_times() {
        let (_dir, mut split) = split_with("the\tcat\t0.5\n");
        split.open().unwrap();
        let batch = split.next_batch(&opts(3)).unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(split.epochs_completed(), 3);
    }

    #[test]
    fn test_trailing_blank_lines_do_not_count_as_rows() {
        let (_dir, mut split) = split_with("the\tcat\t0.1\nsat\tdog\t0.2\n\n\n");
        split.open().unwrap();
        let batch = split.next_batch(&opts(3)).unwrap();
        assert_eq!(batch.sim(), &[0.1, 0.2, 0.1]);
        assert_eq!(split.epochs_completed(), 1);
    }

    #[test]
    fn test_empty_file_fails_instead_of_hanging() {
        let (_dir, mut split) = split_with("");
        split.open().unwrap();
        assert!(matches!(split.next_batch(&opts(1)), Err(DatasetError::Empty(_))));
        assert_eq!(split.epochs_completed(), 0);

        let (_dir, mut blank) = split_with("\n  \n");
        blank.open().unwrap();
        assert!(matches!(blank.next_batch(&opts(1)), Err(DatasetError::Empty(_))));
    }

    #[test]
    fn test_malformed_row_is_validation_error() {
        let (_dir, mut split) = split_with("the cat\t0.8\n");
        split.open().unwrap();
        let err = split.next_batch(&opts(1)).unwrap_err();
        assert!(matches!(err, DatasetError::Validation(_)));
        assert!(err.to_string().contains(":1:"));

        let (_dir, mut split) = split_with("the\tcat\thigh\n");
        split.open().unwrap();
        assert!(matches!(split.next_batch(&opts(1)), Err(DatasetError::Validation(_))));
    }

    #[test]
    fn test_non_utf8_row_is_validation_error() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("dep_train.txt");
        fs::write(&path, b"the cat\tthe dog\t0.4\nthe \xff cat\tdog\t0.5\n").unwrap();
        let mut split = DataSplit::new(path, vocab());
        split.open().unwrap();

        split.next_batch(&opts(1)).unwrap();
        let err = split.next_batch(&opts(1)).unwrap_err();
        assert!(matches!(err, DatasetError::Validation(_)));
        assert!(err.to_string().contains(":2:"));
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let (_dir, mut split) = split_with("the\tcat\t0.5\n");
        split.open().unwrap();
        assert!(matches!(split.next_batch(&opts(0)), Err(DatasetError::Validation(_))));
    }

    #[test]
    fn test_entities_removed_unless_kept() {
        let (_dir, mut split) = split_with("PERSON eats ORG\tthe cat\t1.0\n");
        split.open().unwrap();

        let options = BatchOptions { batch_size: 1, raw: true, ..BatchOptions::default() };
        let batch   = split.next_batch(&options).unwrap();
        assert_eq!(batch.s1().as_tokens().unwrap()[0], vec!["eats".to_string()]);

        let keep  = BatchOptions { keep_entities: true, ..options };
        let batch = split.next_batch(&keep).unwrap();
        assert_eq!(batch.s1().as_tokens().unwrap()[0].len(), 3);
    }

    #[test]
    fn test_downcase_matches_lowercased_vocabulary() {
        let (_dir, mut split) = split_with("PERSON The CAT\tDog\t0.5\n");
        split.open().unwrap();

        let plain = split.next_batch(&opts(1)).unwrap();
        assert_eq!(plain.s1(), &Sentences::Ids(vec![vec![1, 1]]));

        let lower = BatchOptions { downcase: true, ..opts(1) };
        let batch = split.next_batch(&lower).unwrap();
        // the placeholder is removed before lowercasing
        assert_eq!(batch.s1(), &Sentences::Ids(vec![vec![4, 5]]));
        assert_eq!(batch.s2(), &Sentences::Ids(vec![vec![7]]));
    }

    #[test]
    fn test_raw_mode_with_markers_and_padding() {
        let (_dir, mut split) = split_with("the cat\tdog\t0.0\n");
        split.open().unwrap();
        let options = BatchOptions {
            batch_size: 1,
            raw:        true,
            seq_begin:  true,
            seq_end:    true,
            pad:        5,
            ..BatchOptions::default()
        };
        let batch = split.next_batch(&options).unwrap();
        let s2    = &batch.s2().as_tokens().unwrap()[0];
        assert_eq!(s2, &["<GO>", "dog", "<EOS>", "<PAD>", "<PAD>"]);
    }

    #[test]
    fn test_padding_gives_exact_lengths() {
        let rows = "the cat sat the cat sat\tthe\t0.3\ncat\tthe dog ran\t0.6\n";
        let (_dir, mut split) = split_with(rows);
        split.open().unwrap();
        let options = BatchOptions { batch_size: 2, pad: 4, ..BatchOptions::default() };
        let batch   = split.next_batch(&options).unwrap();
        for seq in batch.s1().as_ids().unwrap().iter().chain(batch.s2().as_ids().unwrap()) {
            assert_eq!(seq.len(), 4);
        }
    }

    #[test]
    fn test_set_vocab_changes_encoding() {
        let (_dir, mut split) = split_with("zebra\tzebra\t0.5\n");
        split.open().unwrap();
        let before = split.next_batch(&opts(1)).unwrap();
        assert_eq!(before.s1().as_ids().unwrap()[0], vec![1]);

        split.set_vocab(Arc::new(Vocabulary::from_tokens(["<PAD>", "<UNK>", "<GO>", "<EOS>", "zebra"])));
        let after = split.next_batch(&opts(1)).unwrap();
        assert_eq!(after.s1().as_ids().unwrap()[0], vec![4]);
    }

    #[test]
    fn test_session_closes_on_drop() {
        let (_dir, mut split) = split_with("the\tcat\t0.5\n");
        {
            let mut open = split.session().unwrap();
            assert!(open.next_batch(&opts(1)).is_ok());
        }
        assert!(!split.is_open());
        assert!(matches!(split.next_batch(&opts(1)), Err(DatasetError::Usage(_))));
    }
}
