//! The evaluation orchestration core: pulls observations from the
//! store, cleans and splits them, drives the builder and recommender,
//! and aggregates metrics over one holdout split or over k folds.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::data::Ratings;
use crate::evaluation::{MeanAbsoluteError, PrecisionAtK};
use crate::split::{
    clean_ratings, holdout_user_split, leave_latest_out_split, shuffled_users, user_folds,
    DEFAULT_SEED,
};
use crate::store::RatingStore;
use crate::{EvalError, ModelBuilder, Recommender, UserId};

/// Aggregated metrics of one evaluation pass. For cross-validated runs
/// the ranking and error fields are arithmetic means over all folds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Mean average precision at K.
    pub map: f64,
    /// Average recall at K.
    pub ar: f64,
    /// Mean absolute error; 0 when the mode does not compute it.
    pub mae: f64,
    /// Distinct users that survived cleaning.
    pub users: usize,
}

struct FoldScores {
    map: f64,
    ar: f64,
    mae: f64,
}

/// Orchestrates a single or cross-validated evaluation of one
/// builder/recommender pair. Collaborators are borrowed for the
/// lifetime of the runner; a fresh runner per hyperparameter value is
/// cheap by design.
pub struct EvaluationRunner<'a> {
    store: &'a dyn RatingStore,
    folds: usize,
    builder: Option<&'a mut dyn ModelBuilder>,
    recommender: &'a mut dyn Recommender,
    k: usize,
    params: Option<Value>,
    seed: u64,
}

impl<'a> EvaluationRunner<'a> {
    /// A runner evaluating `recommender` (optionally fitted by
    /// `builder`) at cutoff `k`. `folds == 0` selects the single-pass
    /// 70/30 holdout; `folds > 0` selects k-fold cross-validation.
    pub fn new(
        store: &'a dyn RatingStore,
        folds: usize,
        builder: Option<&'a mut dyn ModelBuilder>,
        recommender: &'a mut dyn Recommender,
        k: usize,
    ) -> Self {
        EvaluationRunner {
            store,
            folds,
            builder,
            recommender,
            k,
            params: None,
            seed: DEFAULT_SEED,
        }
    }

    /// Hyperparameters forwarded to the builder in single-pass mode. A
    /// `save_path` entry is propagated to the recommender after the
    /// build so it can load the persisted artifact.
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    /// Override the user-shuffle seed. Runs sharing a seed see
    /// identical train/test partitions.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Run the evaluation: fetch observations (optionally restricted to
    /// the `number_test_users` most active users), clean with
    /// `min_number_of_ratings`, hold out up to `min_rank` observations
    /// per test user, and score.
    pub fn calculate(
        &mut self,
        min_number_of_ratings: usize,
        min_rank: usize,
        number_test_users: Option<usize>,
    ) -> Result<EvaluationResult, EvalError> {
        if min_rank == 0 {
            return Err(EvalError::Config(
                "min_rank must be at least 1".to_string(),
            ));
        }

        let available = self.store.count().map_err(EvalError::Store)?;
        debug!(available, "ratings available");

        let all_ratings = match number_test_users {
            None => self.store.ratings().map_err(EvalError::Store)?,
            Some(n) => {
                let cohort: HashSet<UserId> = self
                    .store
                    .most_rating_users(n, min_number_of_ratings)
                    .map_err(EvalError::Store)?
                    .into_iter()
                    .collect();
                self.store
                    .ratings_for_users(&cohort)
                    .map_err(EvalError::Store)?
            }
        };

        if self.folds == 0 {
            self.single_pass(&all_ratings, min_number_of_ratings, min_rank)
        } else {
            self.cross_validate(&all_ratings, min_number_of_ratings, min_rank)
        }
    }

    /// One seeded 70/30 user split. MAE is not computed in this mode;
    /// the ranking metrics are the ones sweeps compare on and skipping
    /// prediction scoring keeps the pass cheap.
    fn single_pass(
        &mut self,
        all_ratings: &Ratings,
        min_number_of_ratings: usize,
        min_rank: usize,
    ) -> Result<EvaluationResult, EvalError> {
        let ratings = clean_ratings(all_ratings, min_number_of_ratings);
        let users = shuffled_users(&ratings, self.seed);
        if users.is_empty() {
            warn!("no users survived cleaning; returning empty result");
            return Ok(EvaluationResult::default());
        }

        let (train_users, test_users) = holdout_user_split(&users, 70);
        let split = leave_latest_out_split(
            min_rank,
            &ratings,
            &test_users.into_iter().collect(),
            &train_users.into_iter().collect(),
        );
        debug!(
            train_rows = split.train.len(),
            test_rows = split.test.len(),
            "holdout split ready"
        );

        self.fit(0, &split.train, true)?;

        let (map, ar) =
            PrecisionAtK::new(self.k, &*self.recommender).calculate(&split.train, &split.test)?;

        Ok(EvaluationResult {
            map,
            ar,
            mae: 0.0,
            users: users.len(),
        })
    }

    /// K-fold cross-validation over users. Folds run strictly one after
    /// another; per-fold scores are reduced into the mean once after
    /// the loop.
    fn cross_validate(
        &mut self,
        all_ratings: &Ratings,
        min_number_of_ratings: usize,
        min_rank: usize,
    ) -> Result<EvaluationResult, EvalError> {
        let ratings = clean_ratings(all_ratings, min_number_of_ratings);
        let users = shuffled_users(&ratings, self.seed);
        if users.is_empty() {
            warn!("no users survived cleaning; returning empty result");
            return Ok(EvaluationResult::default());
        }

        let mut outcomes = Vec::with_capacity(self.folds);

        for (fold, (train_users, test_users)) in
            user_folds(&users, self.folds).into_iter().enumerate()
        {
            info!(fold, "starting validation fold");

            let split = leave_latest_out_split(
                min_rank,
                &ratings,
                &test_users.into_iter().collect(),
                &train_users.into_iter().collect(),
            );
            info!(
                fold,
                train_rows = split.train.len(),
                test_rows = split.test.len(),
                "fold split ready"
            );

            self.fit(fold, &split.train, false)?;

            let (map, ar) = PrecisionAtK::new(self.k, &*self.recommender)
                .calculate(&split.train, &split.test)?;
            let mae =
                MeanAbsoluteError::new(&*self.recommender).calculate(&split.train, &split.test)?;

            info!(fold, map, ar, mae, "fold scored");
            outcomes.push(FoldScores { map, ar, mae });
        }

        Ok(average_folds(&outcomes, self.folds, users.len()))
    }

    fn fit(&mut self, fold: usize, train: &Ratings, with_params: bool) -> Result<(), EvalError> {
        let Some(builder) = self.builder.as_deref_mut() else {
            return Ok(());
        };

        let params = if with_params {
            self.params.as_ref()
        } else {
            None
        };

        builder
            .build(train, params)
            .map_err(|source| EvalError::Build { fold, source })?;

        if let Some(path) = params
            .and_then(|value| value.get("save_path"))
            .and_then(|value| value.as_str())
        {
            self.recommender.set_model_path(Path::new(path));
        }

        info!(fold, "model build finished");
        Ok(())
    }
}

/// Mean of the per-fold scores, dividing by the fold count exactly
/// once. Sums are accumulated in f64 before the division.
fn average_folds(outcomes: &[FoldScores], folds: usize, users: usize) -> EvaluationResult {
    let mut maps = 0.0;
    let mut ars = 0.0;
    let mut maes = 0.0;

    for outcome in outcomes {
        maps += outcome.map;
        ars += outcome.ar;
        maes += outcome.mae;
    }

    let folds = folds as f64;
    EvaluationResult {
        map: maps / folds,
        ar: ars / folds,
        mae: maes / folds,
        users,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_averaging_divides_once_after_the_loop() {
        let outcomes = vec![
            FoldScores {
                map: 1.0,
                ar: 3.0,
                mae: 0.5,
            },
            FoldScores {
                map: 2.0,
                ar: 2.0,
                mae: 0.5,
            },
            FoldScores {
                map: 3.0,
                ar: 1.0,
                mae: 0.5,
            },
        ];

        let result = average_folds(&outcomes, 3, 9);
        assert_eq!(result.map, 2.0);
        assert_eq!(result.ar, 2.0);
        assert_eq!(result.mae, 0.5);
        assert_eq!(result.users, 9);
    }

    #[test]
    fn empty_fold_list_yields_zeros() {
        let result = average_folds(&[], 3, 0);
        assert_eq!(result, EvaluationResult::default());
    }
}
