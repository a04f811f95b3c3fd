// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Five subcommands:
//   train        — train a regressor on an STS subset
//   test         — evaluate the latest checkpoint on the test split
//   results      — test + train evaluation of the latest checkpoint
//   build-vocab  — rebuild a subset's vocabulary (and w2v matrix)
//   dep-tree     — linearise CoNLL-U parser output into split files
//
// Score ranges are given as "lo,hi" and validated while parsing.

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::{evaluate_use_case::RunLocation, train_use_case::TrainConfig};
use crate::data::sts::DEFAULT_SUBSET;
use crate::domain::batch::ScoreRange;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the similarity regressor
    Train(TrainArgs),

    /// Evaluate the latest checkpoint of a run on the test split
    Test(TestArgs),

    /// Evaluate the latest checkpoint on the test and train splits
    Results(ResultsArgs),

    /// Rebuild the vocabulary of a dataset subset from its training split
    BuildVocab(BuildVocabArgs),

    /// Convert dependency-parsed sentences into dataset lines
    DepTree(DepTreeArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Dataset group to train on
    #[arg(long, default_value = "sts")]
    pub dataset: String,

    /// Root directory of the datasets
    #[arg(long, default_value = "data")]
    pub data_dir: String,

    #[arg(long, default_value = DEFAULT_SUBSET)]
    pub subset: String,

    /// Use `<name>_vocab.txt` / `<name>_w2v.npy` from `build-vocab`
    #[arg(long)]
    pub vocab_name: Option<String>,

    /// Lowercase tokens before lookup; use with a `build-vocab --downcase` vocabulary
    #[arg(long)]
    pub downcase: bool,

    #[arg(long, default_value = "sts_siamese_regression")]
    pub experiment_name: String,

    /// Checkpoints go to <checkpoint-root>/<experiment-name>
    #[arg(long, default_value = "experiments")]
    pub checkpoint_root: String,

    #[arg(long, default_value_t = 300)]
    pub embedding_dim: usize,

    #[arg(long, default_value_t = 128)]
    pub hidden_units: usize,

    #[arg(long, default_value_t = 0.5)]
    pub dropout: f64,

    /// L2 weight decay (adam and gradient_descent only)
    #[arg(long, default_value_t = 0.0)]
    pub l2_reg_beta: f64,

    #[arg(long, default_value_t = 1e-4)]
    pub learning_rate: f64,

    /// adam, gradient_descent, adagrad or rmsprop
    #[arg(long, default_value = "adam")]
    pub optimizer: String,

    /// Keep the embedding table fixed during training
    #[arg(long)]
    pub freeze_embeddings: bool,

    /// Every sentence is padded or cut to this many tokens
    #[arg(long, default_value_t = 100)]
    pub sequence_length: usize,

    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 300)]
    pub num_epochs: usize,

    /// Validate every this many steps
    #[arg(long, default_value_t = 200)]
    pub evaluate_every: usize,

    /// Checkpoint (if improved) every this many steps
    #[arg(long, default_value_t = 200)]
    pub checkpoint_every: usize,

    /// Validation batches per evaluation; 0 means one full pass
    #[arg(long, default_value_t = 100)]
    pub max_dev_itr: usize,

    /// Range the similarity scores are mapped into, as "lo,hi"
    #[arg(long, default_value = "0,1")]
    pub rescale: ScoreRange,
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            dataset:          a.dataset,
            data_dir:         a.data_dir,
            subset:           a.subset,
            vocab_name:       a.vocab_name,
            downcase:         a.downcase,
            experiment_name:  a.experiment_name,
            checkpoint_root:  a.checkpoint_root,
            embedding_dim:    a.embedding_dim,
            hidden_units:     a.hidden_units,
            dropout:          a.dropout,
            l2_reg_beta:      a.l2_reg_beta,
            learning_rate:    a.learning_rate,
            optimizer:        a.optimizer,
            train_embeddings: !a.freeze_embeddings,
            sequence_length:  a.sequence_length,
            batch_size:       a.batch_size,
            num_epochs:       a.num_epochs,
            evaluate_every:   a.evaluate_every,
            checkpoint_every: a.checkpoint_every,
            max_dev_itr:      a.max_dev_itr,
            rescale:          a.rescale,
        }
    }
}

/// Which trained run to load
#[derive(Args, Debug)]
pub struct RunArgs {
    #[arg(long, default_value = "sts_siamese_regression")]
    pub experiment_name: String,

    #[arg(long, default_value = "experiments")]
    pub checkpoint_root: String,

    /// Read the dataset from here instead of the training-time directory
    #[arg(long)]
    pub data_dir: Option<String>,
}

impl From<RunArgs> for RunLocation {
    fn from(a: RunArgs) -> Self {
        RunLocation {
            checkpoint_root: a.checkpoint_root,
            experiment_name: a.experiment_name,
            data_dir:        a.data_dir,
        }
    }
}

#[derive(Args, Debug)]
pub struct TestArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Also report the scores mapped into this range, as "lo,hi"
    #[arg(long)]
    pub rescale: Option<ScoreRange>,
}

#[derive(Args, Debug)]
pub struct ResultsArgs {
    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Args, Debug)]
pub struct BuildVocabArgs {
    #[arg(long, default_value = "sts")]
    pub dataset: String,

    #[arg(long, default_value = "data")]
    pub data_dir: String,

    #[arg(long, default_value = DEFAULT_SUBSET)]
    pub subset: String,

    /// Output files are <name>_vocab.txt, <name>_metadata.txt, <name>_w2v.npy
    #[arg(long, default_value = "new")]
    pub name: String,

    /// Drop tokens seen fewer times than this
    #[arg(long, default_value_t = 5)]
    pub min_frequency: usize,

    #[arg(long)]
    pub max_vocab_size: Option<usize>,

    #[arg(long)]
    pub downcase: bool,

    #[arg(long, default_value = "whitespace")]
    pub tokenizer: String,

    /// Build a w2v matrix of this width for the new vocabulary
    #[arg(long)]
    pub embedding_dim: Option<usize>,

    /// GloVe-format vectors to copy into the matrix
    #[arg(long, requires = "embedding_dim")]
    pub pretrained: Option<PathBuf>,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[derive(Args, Debug)]
pub struct DepTreeArgs {
    /// CoNLL-U parser output
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long)]
    pub output: PathBuf,

    /// One score per sentence pair; pairs consecutive sentences
    #[arg(long)]
    pub scores: Option<PathBuf>,

    /// Emit lemmas instead of surface forms
    #[arg(long)]
    pub lemmatize: bool,
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_defaults_match_config_defaults() {
        let cli = Cli::try_parse_from(["sts-regression", "train"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        let def = TrainConfig::default();

        assert_eq!(cfg.dataset, def.dataset);
        assert_eq!(cfg.subset, def.subset);
        assert_eq!(cfg.batch_size, def.batch_size);
        assert_eq!(cfg.sequence_length, def.sequence_length);
        assert_eq!(cfg.optimizer, def.optimizer);
        assert_eq!(cfg.rescale, def.rescale);
        assert!(cfg.train_embeddings);
    }

    #[test]
    fn test_train_flags() {
        let cli = Cli::try_parse_from([
            "sts-regression", "train",
            "--rescale", "0,5",
            "--optimizer", "rmsprop",
            "--freeze-embeddings",
            "--vocab-name", "full",
            "--max-dev-itr", "0",
            "--downcase",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();

        assert_eq!(cfg.rescale, ScoreRange::new(0.0, 5.0).unwrap());
        assert_eq!(cfg.optimizer, "rmsprop");
        assert!(!cfg.train_embeddings);
        assert_eq!(cfg.vocab_name.as_deref(), Some("full"));
        assert_eq!(cfg.max_dev_itr, 0);
        assert!(cfg.batch_options().downcase);
    }

    #[test]
    fn test_invalid_rescale_is_rejected_at_parse_time() {
        for bad in ["5,0", "1,1", "0", "a,b"] {
            assert!(
                Cli::try_parse_from(["sts-regression", "train", "--rescale", bad]).is_err(),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_test_command_with_rescale() {
        let cli = Cli::try_parse_from([
            "sts-regression", "test", "--experiment-name", "run1", "--rescale", "1,5",
        ])
        .unwrap();
        let Commands::Test(args) = cli.command else { panic!("expected test") };
        assert_eq!(args.rescale, Some(ScoreRange::new(1.0, 5.0).unwrap()));
        let run: RunLocation = args.run.into();
        assert_eq!(run.experiment_name, "run1");
        assert!(run.data_dir.is_none());
    }

    #[test]
    fn test_build_vocab_and_dep_tree() {
        let cli = Cli::try_parse_from([
            "sts-regression", "build-vocab", "--name", "full", "--min-frequency", "1",
            "--embedding-dim", "50",
        ])
        .unwrap();
        let Commands::BuildVocab(args) = cli.command else { panic!("expected build-vocab") };
        assert_eq!(args.name, "full");
        assert_eq!(args.embedding_dim, Some(50));

        // pretrained vectors need a matrix width
        assert!(Cli::try_parse_from([
            "sts-regression", "build-vocab", "--pretrained", "glove.txt",
        ])
        .is_err());

        let cli = Cli::try_parse_from([
            "sts-regression", "dep-tree", "--input", "in.conll", "--output", "out.txt", "--lemmatize",
        ])
        .unwrap();
        let Commands::DepTree(args) = cli.command else { panic!("expected dep-tree") };
        assert!(args.lemmatize);
        assert!(args.scores.is_none());
    }
}
