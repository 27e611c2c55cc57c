//! Batch evaluation entry point: loads a ratings file and runs the
//! requested sweep(s), writing one timestamped CSV report per family.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use receval::store::CsvRatingStore;
use receval::sweep::{evaluate_popularity_recommender, SweepOptions};

#[derive(Parser, Debug)]
#[command(name = "evaluate", about = "Evaluate recommender algorithms offline.")]
struct Args {
    /// Headered CSV of user_id, item_id, rating, timestamp observations.
    #[arg(long)]
    ratings: PathBuf,

    /// Directory sweep reports are written to.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Run the popularity-recommender sweep.
    #[arg(long)]
    pop: bool,

    /// Also compute catalog coverage per swept value (slow).
    #[arg(long)]
    coverage: bool,

    /// Cross-validation folds; 0 runs a single 70/30 holdout.
    #[arg(long, default_value_t = 0)]
    folds: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let store = CsvRatingStore::from_path(&args.ratings)?;

    if args.pop {
        let options = SweepOptions {
            folds: args.folds,
            coverage: args.coverage,
            ..SweepOptions::default()
        };
        let report = evaluate_popularity_recommender(&store, &args.out_dir, &options)?;
        println!("popularity sweep report: {}", report.display());
    }

    Ok(())
}
