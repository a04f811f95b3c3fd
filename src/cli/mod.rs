// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses the command line with `clap` and hands every command
// to its use case in Layer 2. Final numbers are printed here,
// progress goes through `tracing`.

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{BuildVocabArgs, Commands, DepTreeArgs, ResultsArgs, TestArgs, TrainArgs};

use crate::application::evaluate_use_case::EvalReport;

#[derive(Parser, Debug)]
#[command(
    name = "sts-regression",
    version = "0.1.0",
    about = "Train and evaluate a sentence-similarity regressor on STS data."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)      => run_train(args),
            Commands::Test(args)       => run_test(args),
            Commands::Results(args)    => run_results(args),
            Commands::BuildVocab(args) => run_build_vocab(args),
            Commands::DepTree(args)    => run_dep_tree(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on {}/{}", args.data_dir, args.subset);
    let summary = TrainUseCase::new(args.into()).execute()?;

    println!(
        "Training complete: {} steps, {} epochs, {} checkpoints.",
        summary.steps, summary.epochs, summary.checkpoints_saved
    );
    if let Some(best) = summary.best_val_loss {
        println!("Best validation loss: {best:.6}");
    }
    Ok(())
}

fn run_test(args: TestArgs) -> Result<()> {
    use crate::application::evaluate_use_case::TestUseCase;

    let outcome = TestUseCase::new(args.run.into(), args.rescale).execute()?;
    print_report("TEST", &outcome.report);
    if let (Some(range), Some(rescaled)) = (args.rescale, outcome.rescaled) {
        println!(
            "Rescaled to [{}, {}]: Pearson {:.6}, MSE {:.6}",
            range.lo(),
            range.hi(),
            rescaled.overall_pearson(),
            rescaled.overall_mse()
        );
    }
    Ok(())
}

fn run_results(args: ResultsArgs) -> Result<()> {
    use crate::application::evaluate_use_case::ResultsUseCase;

    let outcome = ResultsUseCase::new(args.run.into()).execute()?;
    print_report("TEST", &outcome.test);
    print_report("TRAIN", &outcome.train);
    println!("Overall Pearson: {:.6}", outcome.combined_pearson);
    println!("Overall MSE:     {:.6}", outcome.combined_mse);
    Ok(())
}

fn run_build_vocab(args: BuildVocabArgs) -> Result<()> {
    use crate::application::vocab_use_case::{BuildVocabRequest, BuildVocabUseCase};
    use crate::data::sts::EmbeddingInit;
    use crate::infra::vocab_store::VocabParams;

    let request = BuildVocabRequest {
        dataset:    args.dataset,
        data_dir:   args.data_dir,
        subset:     args.subset,
        params:     VocabParams {
            min_frequency:  args.min_frequency,
            tokenizer:      args.tokenizer,
            downcase:       args.downcase,
            max_vocab_size: args.max_vocab_size,
            name:           args.name,
        },
        embeddings: args.embedding_dim.map(|dim| EmbeddingInit {
            dim,
            pretrained: args.pretrained,
            seed:       args.seed,
        }),
    };
    let outcome = BuildVocabUseCase::new(request).execute()?;

    println!("Vocabulary of {} tokens: {}", outcome.vocab_size, outcome.vocab_path.display());
    if let Some(w2v) = outcome.w2v_path {
        println!("Embedding matrix: {}", w2v.display());
    }
    Ok(())
}

fn run_dep_tree(args: DepTreeArgs) -> Result<()> {
    use crate::application::deptree_use_case::DepTreeUseCase;

    let lines = DepTreeUseCase::new(&args.input, &args.output, args.scores, args.lemmatize)
        .execute()?;
    println!("Wrote {} lines to {}", lines, args.output.display());
    Ok(())
}

fn print_report(label: &str, report: &EvalReport) {
    println!("{label}: {} batches, {} pairs", report.batches, report.records.len());
    println!("  Average Pearson: {:.6}", report.avg_pearson);
    println!("  Average MSE:     {:.6}", report.avg_loss);
}
