//! Hyperparameter sweeps around the evaluation runner. A sweep
//! iterates the recommendation cutoff over a fixed range, evaluates a
//! fresh recommender per value, and appends one row per value to a
//! timestamped CSV report.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Local;
use serde::Serialize;
use tracing::info;

use crate::evaluation::RecommenderCoverage;
use crate::models::popularity::PopularityRecommender;
use crate::runner::EvaluationRunner;
use crate::store::RatingStore;

/// One report row per swept cutoff value.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct SweepRow {
    /// Average recall at K.
    pub ar: f64,
    /// Mean average precision at K.
    pub map: f64,
    /// Mean absolute error (0 for single-pass sweeps).
    pub mae: f64,
    /// The swept cutoff.
    pub k: usize,
    /// Cleaning threshold the run used.
    pub min_number_of_ratings: usize,
    /// Per-user holdout size the run used.
    pub min_rank: usize,
    /// Percentage of users reached, 0 when coverage was skipped.
    pub user_coverage: f64,
    /// Percentage of the catalog reached, 0 when coverage was skipped.
    pub item_coverage: f64,
}

/// Append-only CSV report. One header row, one row per swept value,
/// flushed after every append so an aborted sweep keeps the rows it
/// already produced. The file name carries a run timestamp to avoid
/// collisions across runs.
pub struct SweepReport {
    writer: csv::Writer<File>,
    path: PathBuf,
}

impl SweepReport {
    /// Create `{timestamp}-{family}.csv` under `dir`.
    pub fn create(dir: &Path, family: &str) -> anyhow::Result<Self> {
        let stamp = Local::now().format("%Y%m%d-%H%M%S");
        let path = dir.join(format!("{stamp}-{family}.csv"));

        let writer = csv::Writer::from_path(&path)
            .with_context(|| format!("creating sweep report {}", path.display()))?;

        Ok(SweepReport { writer, path })
    }

    /// Where the report is being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one row and flush it to disk.
    pub fn append(&mut self, row: &SweepRow) -> anyhow::Result<()> {
        self.writer.serialize(row)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Fixed evaluation parameters of one sweep run.
#[derive(Clone, Copy, Debug)]
pub struct SweepOptions {
    /// Cross-validation folds; 0 runs single 70/30 holdouts.
    pub folds: usize,
    /// Whether to also compute catalog coverage per value (slow).
    pub coverage: bool,
    /// Cleaning threshold.
    pub min_number_of_ratings: usize,
    /// Per-user holdout size.
    pub min_rank: usize,
}

impl Default for SweepOptions {
    fn default() -> Self {
        SweepOptions {
            folds: 0,
            coverage: false,
            min_number_of_ratings: 20,
            min_rank: 5,
        }
    }
}

/// Sweep the cutoff for the popularity family over K = 0, 2, ..., 18,
/// evaluating a fresh recommender per value. Returns the report path.
pub fn evaluate_popularity_recommender(
    store: &dyn RatingStore,
    out_dir: &Path,
    options: &SweepOptions,
) -> anyhow::Result<PathBuf> {
    let ratings = store.ratings()?;
    let mut report = SweepReport::create(out_dir, "pop")?;

    for k in (0..20).step_by(2) {
        let mut recommender = PopularityRecommender::new(&ratings);

        let result = EvaluationRunner::new(store, options.folds, None, &mut recommender, k)
            .calculate(options.min_number_of_ratings, options.min_rank, None)?;

        let (user_coverage, item_coverage) = if options.coverage {
            RecommenderCoverage::new(&recommender, &ratings).calculate(k)?
        } else {
            (0.0, 0.0)
        };

        info!(
            k,
            map = result.map,
            ar = result.ar,
            mae = result.mae,
            "swept popularity cutoff"
        );

        report.append(&SweepRow {
            ar: result.ar,
            map: result.map,
            mae: result.mae,
            k,
            min_number_of_ratings: options.min_number_of_ratings,
            min_rank: options.min_rank,
            user_coverage,
            item_coverage,
        })?;
    }

    Ok(report.path().to_path_buf())
}
