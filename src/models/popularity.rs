//! Popularity-based recommendations: items ranked by how often they
//! have been rated, rating predictions from per-item means. The model
//! is memory-less — it is constructed directly from a rating table and
//! needs no builder.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use crate::data::{Rating, Ratings};
use crate::{ItemId, PredictionError, Recommender, ScoredItem, UserId};

/// Recommends the most-rated items a user has not seen yet and
/// predicts an item's mean rating.
#[derive(Clone, Debug)]
pub struct PopularityRecommender {
    ranked: Vec<(ItemId, usize)>,
    item_means: HashMap<ItemId, f32>,
    global_mean: f32,
}

impl PopularityRecommender {
    /// Derive popularity ranks and per-item means from `ratings`.
    /// Items with equal counts rank by ascending id so the ordering is
    /// reproducible.
    pub fn new(ratings: &Ratings) -> Self {
        let mut totals: HashMap<ItemId, (usize, f64)> = HashMap::new();
        let mut rating_sum = 0.0;

        for rating in ratings.data() {
            let entry = totals.entry(rating.item_id()).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += rating.rating() as f64;
            rating_sum += rating.rating() as f64;
        }

        let mut ranked: Vec<(ItemId, usize)> = totals
            .iter()
            .map(|(&item, &(count, _))| (item, count))
            .collect();
        ranked.sort_by_key(|&(item, count)| (Reverse(count), item));

        let item_means = totals
            .into_iter()
            .map(|(item, (count, sum))| (item, (sum / count as f64) as f32))
            .collect();

        let global_mean = if ratings.is_empty() {
            0.0
        } else {
            (rating_sum / ratings.len() as f64) as f32
        };

        PopularityRecommender {
            ranked,
            item_means,
            global_mean,
        }
    }
}

impl Recommender for PopularityRecommender {
    fn recommend(
        &self,
        _user_id: UserId,
        rated: &[Rating],
        k: usize,
    ) -> Result<Vec<ScoredItem>, PredictionError> {
        let seen: HashSet<ItemId> = rated.iter().map(|x| x.item_id()).collect();

        Ok(self
            .ranked
            .iter()
            .filter(|&&(item, _)| !seen.contains(&item))
            .take(k)
            .map(|&(item_id, count)| ScoredItem {
                item_id,
                score: count as f32,
            })
            .collect())
    }

    fn predict(
        &self,
        _user_id: UserId,
        _rated: &[Rating],
        item_id: ItemId,
    ) -> Result<f32, PredictionError> {
        Ok(self
            .item_means
            .get(&item_id)
            .copied()
            .unwrap_or(self.global_mean))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ratings() -> Ratings {
        Ratings::from(vec![
            Rating::new(1, 10, 4.0, 1),
            Rating::new(2, 10, 2.0, 1),
            Rating::new(3, 10, 3.0, 1),
            Rating::new(1, 11, 5.0, 2),
            Rating::new(2, 11, 1.0, 2),
            Rating::new(1, 12, 5.0, 3),
            Rating::new(2, 13, 4.0, 4),
        ])
    }

    #[test]
    fn ranks_by_count_with_id_tiebreak() {
        let recommender = PopularityRecommender::new(&ratings());
        let recs = recommender.recommend(9, &[], 10).unwrap();

        // items 12 and 13 are tied on count and fall back to id order
        let items: Vec<ItemId> = recs.iter().map(|x| x.item_id).collect();
        assert_eq!(items, vec![10, 11, 12, 13]);
    }

    #[test]
    fn excludes_already_rated_items_and_truncates() {
        let recommender = PopularityRecommender::new(&ratings());
        let rated = vec![Rating::new(1, 10, 4.0, 1)];

        let recs = recommender.recommend(1, &rated, 1).unwrap();
        let items: Vec<ItemId> = recs.iter().map(|x| x.item_id).collect();
        assert_eq!(items, vec![11]);
    }

    #[test]
    fn predicts_item_mean_with_global_fallback() {
        let recommender = PopularityRecommender::new(&ratings());

        assert_eq!(recommender.predict(1, &[], 10).unwrap(), 3.0);
        // unknown item falls back to the global mean: 24 / 7
        let fallback = recommender.predict(1, &[], 99).unwrap();
        assert!((fallback - 24.0 / 7.0).abs() < 1e-6);
    }

    #[test]
    fn empty_catalog_recommends_nothing() {
        let recommender = PopularityRecommender::new(&Ratings::empty());
        assert!(recommender.recommend(1, &[], 5).unwrap().is_empty());
        assert_eq!(recommender.predict(1, &[], 10).unwrap(), 0.0);
    }
}
