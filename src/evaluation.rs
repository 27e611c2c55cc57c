//! Metric evaluators scoring a fitted recommender against held-out
//! observations: precision/recall at K, mean absolute error, and
//! catalog coverage.
//!
//! Per-user scoring is parallelized, but results are collected in user
//! order and reduced sequentially, so repeated runs produce identical
//! numbers.

use std::collections::HashSet;

use rayon::prelude::*;

use crate::data::Ratings;
use crate::{ItemId, PredictionError, Recommender, ScoredItem};

/// Ranking-quality evaluator producing mean average precision and
/// average recall at a cutoff of `k`.
pub struct PrecisionAtK<'a> {
    k: usize,
    recommender: &'a dyn Recommender,
}

impl<'a> PrecisionAtK<'a> {
    /// Evaluator recommending `k` items per user from `recommender`.
    pub fn new(k: usize, recommender: &'a dyn Recommender) -> Self {
        PrecisionAtK { k, recommender }
    }

    /// Score every test user's recommendations against their held-out
    /// items and return `(map, ar)`.
    ///
    /// A user for whom the recommender returns no candidates counts
    /// zero towards both metrics; a user with no held-out observations
    /// is skipped entirely. With no scorable users at all the result is
    /// `(0.0, 0.0)`.
    pub fn calculate(
        &self,
        train: &Ratings,
        test: &Ratings,
    ) -> Result<(f64, f64), PredictionError> {
        let train_index = train.by_user();
        let test_index = test.by_user();

        let scores: Vec<Option<(f64, f64)>> = test_index
            .iter()
            .collect::<Vec<_>>()
            .par_iter()
            .map(|&(user, held_out)| {
                if held_out.is_empty() {
                    return Ok(None);
                }

                let rated = train_index.get(user).unwrap_or(&[]);
                let recommended = self.recommender.recommend(user, rated, self.k)?;

                let relevant: HashSet<ItemId> =
                    held_out.iter().map(|x| x.item_id()).collect();

                let ap = average_precision(&recommended, &relevant, self.k);
                let hits = recommended
                    .iter()
                    .take(self.k)
                    .filter(|x| relevant.contains(&x.item_id))
                    .count();
                let recall = if self.k == 0 {
                    0.0
                } else {
                    hits as f64 / relevant.len() as f64
                };

                Ok(Some((ap, recall)))
            })
            .collect::<Result<_, PredictionError>>()?;

        let scores: Vec<(f64, f64)> = scores.into_iter().flatten().collect();
        if scores.is_empty() {
            return Ok((0.0, 0.0));
        }

        let count = scores.len() as f64;
        let map = scores.iter().map(|x| x.0).sum::<f64>() / count;
        let ar = scores.iter().map(|x| x.1).sum::<f64>() / count;

        Ok((map, ar))
    }
}

fn average_precision(
    recommended: &[ScoredItem],
    relevant: &HashSet<ItemId>,
    k: usize,
) -> f64 {
    if k == 0 || relevant.is_empty() || recommended.is_empty() {
        return 0.0;
    }

    let mut hits = 0;
    let mut precision_sum = 0.0;

    for (position, rec) in recommended.iter().take(k).enumerate() {
        if relevant.contains(&rec.item_id) {
            hits += 1;
            precision_sum += hits as f64 / (position + 1) as f64;
        }
    }

    precision_sum / relevant.len().min(k) as f64
}

/// Error evaluator producing the mean absolute difference between
/// predicted and actual ratings over all held-out observations.
pub struct MeanAbsoluteError<'a> {
    recommender: &'a dyn Recommender,
}

impl<'a> MeanAbsoluteError<'a> {
    /// Evaluator predicting through `recommender`.
    pub fn new(recommender: &'a dyn Recommender) -> Self {
        MeanAbsoluteError { recommender }
    }

    /// Mean |predicted − actual| over the test set; `0.0` when the
    /// test set is empty.
    pub fn calculate(&self, train: &Ratings, test: &Ratings) -> Result<f64, PredictionError> {
        let train_index = train.by_user();
        let test_index = test.by_user();

        let errors: Vec<(f64, usize)> = test_index
            .iter()
            .collect::<Vec<_>>()
            .par_iter()
            .map(|&(user, held_out)| {
                let rated = train_index.get(user).unwrap_or(&[]);

                let mut total = 0.0;
                for observation in held_out {
                    let predicted =
                        self.recommender
                            .predict(user, rated, observation.item_id())?;
                    total += (predicted as f64 - observation.rating() as f64).abs();
                }

                Ok((total, held_out.len()))
            })
            .collect::<Result<_, PredictionError>>()?;

        let count: usize = errors.iter().map(|x| x.1).sum();
        if count == 0 {
            return Ok(0.0);
        }

        Ok(errors.iter().map(|x| x.0).sum::<f64>() / count as f64)
    }
}

/// Coverage evaluator measuring how much of the user base and item
/// catalog a recommender's top-K output reaches.
pub struct RecommenderCoverage<'a> {
    recommender: &'a dyn Recommender,
    ratings: &'a Ratings,
}

impl<'a> RecommenderCoverage<'a> {
    /// Coverage over the full `ratings` catalog.
    pub fn new(recommender: &'a dyn Recommender, ratings: &'a Ratings) -> Self {
        RecommenderCoverage {
            recommender,
            ratings,
        }
    }

    /// Percentage of users receiving at least one recommendation and
    /// percentage of catalog items recommended to anyone, at cutoff `k`.
    pub fn calculate(&self, k: usize) -> Result<(f64, f64), PredictionError> {
        let index = self.ratings.by_user();
        if index.is_empty() || self.ratings.num_items() == 0 {
            return Ok((0.0, 0.0));
        }

        let per_user: Vec<Vec<ItemId>> = index
            .iter()
            .collect::<Vec<_>>()
            .par_iter()
            .map(|&(user, history)| {
                let recommended = self.recommender.recommend(user, history, k)?;
                Ok(recommended.into_iter().map(|x| x.item_id).collect())
            })
            .collect::<Result<_, PredictionError>>()?;

        let covered_users = per_user.iter().filter(|x| !x.is_empty()).count();
        let covered_items: HashSet<ItemId> =
            per_user.into_iter().flatten().collect();

        let user_pct = 100.0 * covered_users as f64 / index.user_count() as f64;
        let item_pct = 100.0 * covered_items.len() as f64 / self.ratings.num_items() as f64;

        Ok((user_pct, item_pct))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    use crate::data::Rating;
    use crate::UserId;

    /// Recommends a fixed list per user and predicts a constant score.
    struct FixedRecommender {
        recommendations: HashMap<UserId, Vec<ItemId>>,
        predicted: f32,
    }

    impl Recommender for FixedRecommender {
        fn recommend(
            &self,
            user_id: UserId,
            _rated: &[Rating],
            k: usize,
        ) -> Result<Vec<ScoredItem>, PredictionError> {
            let items = self
                .recommendations
                .get(&user_id)
                .cloned()
                .unwrap_or_default();

            Ok(items
                .into_iter()
                .take(k)
                .enumerate()
                .map(|(rank, item_id)| ScoredItem {
                    item_id,
                    score: -(rank as f32),
                })
                .collect())
        }

        fn predict(
            &self,
            _user_id: UserId,
            _rated: &[Rating],
            _item_id: ItemId,
        ) -> Result<f32, PredictionError> {
            Ok(self.predicted)
        }
    }

    fn split_fixture() -> (Ratings, Ratings) {
        let train = Ratings::from(vec![
            Rating::new(1, 10, 4.0, 1),
            Rating::new(2, 10, 4.0, 1),
        ]);
        let test = Ratings::from(vec![
            Rating::new(1, 20, 4.0, 2),
            Rating::new(1, 21, 4.0, 3),
            Rating::new(2, 20, 4.0, 2),
            Rating::new(2, 21, 4.0, 3),
        ]);
        (train, test)
    }

    #[test]
    fn perfect_recommendations_score_one() {
        let (train, test) = split_fixture();
        let recommender = FixedRecommender {
            recommendations: [(1, vec![20, 21]), (2, vec![21, 20])].into_iter().collect(),
            predicted: 0.0,
        };

        let (map, ar) = PrecisionAtK::new(5, &recommender)
            .calculate(&train, &test)
            .unwrap();
        assert_eq!(map, 1.0);
        assert_eq!(ar, 1.0);
    }

    #[test]
    fn users_without_candidates_contribute_zero() {
        let (train, test) = split_fixture();
        // user 2 gets no recommendations at all
        let recommender = FixedRecommender {
            recommendations: [(1, vec![20, 21])].into_iter().collect(),
            predicted: 0.0,
        };

        let (map, ar) = PrecisionAtK::new(5, &recommender)
            .calculate(&train, &test)
            .unwrap();
        assert_eq!(map, 0.5);
        assert_eq!(ar, 0.5);
    }

    #[test]
    fn cutoff_of_zero_scores_zero() {
        let (train, test) = split_fixture();
        let recommender = FixedRecommender {
            recommendations: [(1, vec![20]), (2, vec![20])].into_iter().collect(),
            predicted: 0.0,
        };

        let (map, ar) = PrecisionAtK::new(0, &recommender)
            .calculate(&train, &test)
            .unwrap();
        assert_eq!((map, ar), (0.0, 0.0));
    }

    #[test]
    fn empty_test_set_scores_zero() {
        let (train, _) = split_fixture();
        let recommender = FixedRecommender {
            recommendations: HashMap::new(),
            predicted: 0.0,
        };

        let (map, ar) = PrecisionAtK::new(5, &recommender)
            .calculate(&train, &Ratings::empty())
            .unwrap();
        assert_eq!((map, ar), (0.0, 0.0));

        let mae = MeanAbsoluteError::new(&recommender)
            .calculate(&train, &Ratings::empty())
            .unwrap();
        assert_eq!(mae, 0.0);
    }

    #[test]
    fn mae_measures_constant_offset() {
        let (train, test) = split_fixture();
        let recommender = FixedRecommender {
            recommendations: HashMap::new(),
            predicted: 3.0,
        };

        // every actual rating is 4.0, every prediction 3.0
        let mae = MeanAbsoluteError::new(&recommender)
            .calculate(&train, &test)
            .unwrap();
        assert_eq!(mae, 1.0);
    }

    #[test]
    fn coverage_counts_users_and_catalog_items() {
        let ratings = Ratings::from(vec![
            Rating::new(1, 10, 4.0, 1),
            Rating::new(2, 11, 4.0, 1),
            Rating::new(3, 12, 4.0, 1),
            Rating::new(4, 13, 4.0, 1),
        ]);
        // one catalog item recommended to half the users
        let recommender = FixedRecommender {
            recommendations: [(1, vec![10]), (2, vec![10])].into_iter().collect(),
            predicted: 0.0,
        };

        let (user_pct, item_pct) = RecommenderCoverage::new(&recommender, &ratings)
            .calculate(5)
            .unwrap();
        assert_eq!(user_pct, 50.0);
        assert_eq!(item_pct, 25.0);
    }
}
