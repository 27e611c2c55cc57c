//! # receval
//!
//! `receval` is an offline evaluation harness for recommender systems:
//! it splits held-out user ratings into train and test sets, drives any
//! recommender implementation over the splits, and aggregates ranking
//! and error metrics into a single result record, either from one
//! seeded 70/30 split or from k-fold cross-validation over users.
//!
//! The harness is agnostic to the algorithm under test: it only speaks
//! the [`ModelBuilder`] and [`Recommender`] capability traits, so
//! popularity, neighborhood, matrix-factorization, ranking and hybrid
//! families all evaluate through the same loop.
//!
//! ## Example
//!
//! ```rust
//! use receval::data::Rating;
//! use receval::models::popularity::PopularityRecommender;
//! use receval::runner::EvaluationRunner;
//! use receval::store::{MemoryRatingStore, RatingStore};
//!
//! let mut rows = Vec::new();
//! for user in 0..20 {
//!     for item in 0..10 {
//!         let score = (1 + (user + item) % 5) as f32;
//!         rows.push(Rating::new(user, item, score, item));
//!     }
//! }
//!
//! let store = MemoryRatingStore::new(rows);
//! let ratings = store.ratings().unwrap();
//!
//! let mut recommender = PopularityRecommender::new(&ratings);
//! let mut runner = EvaluationRunner::new(&store, 0, None, &mut recommender, 5);
//!
//! let result = runner.calculate(3, 2, None).unwrap();
//! println!(
//!     "MAP {:.3}, AR {:.3} over {} users",
//!     result.map, result.ar, result.users
//! );
//! ```

use std::path::Path;

use thiserror::Error;

pub mod data;
#[cfg(feature = "datasets")]
pub mod datasets;
pub mod evaluation;
pub mod models;
pub mod runner;
pub mod split;
pub mod store;
pub mod sweep;

use crate::data::{Rating, Ratings};

/// Alias for user indices.
pub type UserId = usize;
/// Alias for item indices.
pub type ItemId = usize;
/// Alias for timestamps.
pub type Timestamp = usize;

/// Prediction error types.
#[derive(Debug, Error)]
pub enum PredictionError {
    /// Failed prediction due to numerical issues.
    #[error("invalid prediction value: non-finite or not a number")]
    InvalidPredictionValue,
}

/// Errors surfaced by the evaluation harness.
#[derive(Debug, Error)]
pub enum EvalError {
    /// Missing or inconsistent evaluation parameters, rejected before
    /// any data is touched.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// The rating store failed to answer a query.
    #[error("rating store query failed")]
    Store(#[source] anyhow::Error),
    /// A model builder failed to fit. Fatal for the whole run: a
    /// corrupted fold would invalidate the averaged metrics.
    #[error("model build failed on fold {fold}")]
    Build {
        /// Index of the fold whose fit failed.
        fold: usize,
        /// Underlying builder error.
        #[source]
        source: anyhow::Error,
    },
    /// A recommender failed while scoring.
    #[error(transparent)]
    Prediction(#[from] PredictionError),
}

/// An item together with the score a recommender assigned to it.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScoredItem {
    /// Recommended item.
    pub item_id: ItemId,
    /// Ranking score; higher ranks earlier.
    pub score: f32,
}

/// Trait describing components that fit a recommender model from
/// training data. Builders may persist the fitted artifact to a path
/// named in `params` for the recommender to load later.
pub trait ModelBuilder {
    /// Fit a model on `train`, optionally steered by a map of
    /// hyperparameters (factor counts, iteration counts, `save_path`, ...).
    fn build(
        &mut self,
        train: &Ratings,
        params: Option<&serde_json::Value>,
    ) -> anyhow::Result<()>;
}

/// Trait describing fitted models that can rank items and predict
/// ratings for a user, given the ratings that user made at training
/// time.
pub trait Recommender: Send + Sync {
    /// Rank catalog items for `user_id` and return the top `k`, best
    /// first. Items present in `rated` are already known to the user
    /// and should not come back. An empty result is not an error; the
    /// metrics treat such users as scoring zero.
    fn recommend(
        &self,
        user_id: UserId,
        rated: &[Rating],
        k: usize,
    ) -> Result<Vec<ScoredItem>, PredictionError>;

    /// Predict the rating `user_id` would give `item_id`.
    fn predict(
        &self,
        user_id: UserId,
        rated: &[Rating],
        item_id: ItemId,
    ) -> Result<f32, PredictionError>;

    /// Point the recommender at a persisted model artifact. The default
    /// implementation ignores the path; in-memory models do not need one.
    fn set_model_path(&mut self, _path: &Path) {}
}
