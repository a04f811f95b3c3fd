// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from a tab separated pair file to model-ready
// tensors. One call to DataSplit::next_batch runs:
//
//   dep_<split>.txt
//       │
//       ▼
//   DataSplit         → cycles over the file, counts epochs
//       │
//       ▼
//   entities          → drops named-entity placeholder tokens
//       │
//       ▼
//   SequenceEncoder   → tokens to ids, <GO>/<EOS> markers
//       │
//       ▼
//   pad_to            → fixed-length sequences
//       │
//       ▼
//   rescale           → scores into the requested range
//       │
//       ▼
//   SimilarityBatcher → Burn tensors (model-backed drivers only)
//
// Sts groups the three splits of the corpus around one shared
// vocabulary. deptree produces the bracketed sentences the
// pair files are made of.

/// Token ↔ id mapping with reserved tokens
pub mod vocabulary;

/// Named-entity placeholder filter
pub mod entities;

/// Id mapping, sequence markers and padding
pub mod encoder;

/// Linear score range mapping
pub mod rescale;

/// One dataset split: record source + batch assembly
pub mod split;

/// The STS corpus: three splits and vocabulary rebuilds
pub mod sts;

/// Domain batches → Burn tensors
pub mod batcher;

/// Parsed sentence → bracketed dependency sequence
pub mod deptree;
