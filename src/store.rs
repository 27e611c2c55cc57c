//! The rating store query surface the runner pulls observations from,
//! with in-memory and CSV-file backed implementations for local batch
//! evaluation.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;

use crate::data::{Rating, Ratings};
use crate::UserId;

/// Queries the evaluation runner makes against a source of rating
/// observations. Implementations over databases or services belong to
/// the embedding application; the harness only depends on this trait.
pub trait RatingStore {
    /// Total number of observations available.
    fn count(&self) -> anyhow::Result<usize>;

    /// Every observation in the store.
    fn ratings(&self) -> anyhow::Result<Ratings>;

    /// Observations belonging to the given users.
    fn ratings_for_users(&self, users: &HashSet<UserId>) -> anyhow::Result<Ratings>;

    /// The `n` users with the most observations, restricted to users
    /// whose count strictly exceeds `min_ratings`. Ordered by
    /// descending count with ascending user id breaking ties, so the
    /// same store always returns the same cohort.
    fn most_rating_users(&self, n: usize, min_ratings: usize) -> anyhow::Result<Vec<UserId>>;
}

/// A store over an owned in-memory rating table.
#[derive(Clone, Debug, Default)]
pub struct MemoryRatingStore {
    ratings: Ratings,
}

impl MemoryRatingStore {
    /// Build a store from raw observations.
    pub fn new(rows: Vec<Rating>) -> Self {
        MemoryRatingStore {
            ratings: Ratings::from(rows),
        }
    }
}

impl From<Ratings> for MemoryRatingStore {
    fn from(ratings: Ratings) -> Self {
        MemoryRatingStore { ratings }
    }
}

impl RatingStore for MemoryRatingStore {
    fn count(&self) -> anyhow::Result<usize> {
        Ok(self.ratings.len())
    }

    fn ratings(&self) -> anyhow::Result<Ratings> {
        Ok(self.ratings.clone())
    }

    fn ratings_for_users(&self, users: &HashSet<UserId>) -> anyhow::Result<Ratings> {
        Ok(self.ratings.filter_users(users))
    }

    fn most_rating_users(&self, n: usize, min_ratings: usize) -> anyhow::Result<Vec<UserId>> {
        let mut counts: Vec<(UserId, usize)> = self
            .ratings
            .counts_per_user()
            .into_iter()
            .filter(|&(_, count)| count > min_ratings)
            .collect();

        counts.sort_by_key(|&(user, count)| (Reverse(count), user));
        counts.truncate(n);

        Ok(counts.into_iter().map(|(user, _)| user).collect())
    }
}

/// A store reading a headered CSV file with `user_id`, `item_id`,
/// `rating` and `timestamp` columns. The file is materialized into
/// memory once at construction.
#[derive(Clone, Debug)]
pub struct CsvRatingStore {
    inner: MemoryRatingStore,
}

impl CsvRatingStore {
    /// Load the ratings file at `path`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("opening ratings file {}", path.display()))?;

        let rows: Vec<Rating> = reader
            .deserialize()
            .collect::<Result<_, _>>()
            .with_context(|| format!("parsing ratings file {}", path.display()))?;

        Ok(CsvRatingStore {
            inner: MemoryRatingStore::new(rows),
        })
    }
}

impl RatingStore for CsvRatingStore {
    fn count(&self) -> anyhow::Result<usize> {
        self.inner.count()
    }

    fn ratings(&self) -> anyhow::Result<Ratings> {
        self.inner.ratings()
    }

    fn ratings_for_users(&self, users: &HashSet<UserId>) -> anyhow::Result<Ratings> {
        self.inner.ratings_for_users(users)
    }

    fn most_rating_users(&self, n: usize, min_ratings: usize) -> anyhow::Result<Vec<UserId>> {
        self.inner.most_rating_users(n, min_ratings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::env;
    use std::fs;

    fn store() -> MemoryRatingStore {
        let mut rows = Vec::new();
        for (user, count) in [(1, 4), (2, 6), (3, 6), (4, 2)] {
            for item in 0..count {
                rows.push(Rating::new(user, item, 3.0, item));
            }
        }
        MemoryRatingStore::new(rows)
    }

    #[test]
    fn most_rating_users_orders_by_count_then_id() {
        let top = store().most_rating_users(3, 0).unwrap();
        assert_eq!(top, vec![2, 3, 1]);
    }

    #[test]
    fn most_rating_users_requires_strictly_more_than_minimum() {
        let top = store().most_rating_users(10, 4).unwrap();
        assert_eq!(top, vec![2, 3]);
    }

    #[test]
    fn ratings_for_users_filters() {
        let subset = store()
            .ratings_for_users(&[1, 4].iter().cloned().collect())
            .unwrap();
        assert_eq!(subset.len(), 6);
        assert_eq!(subset.num_users(), 2);
    }

    #[test]
    fn csv_store_round_trips() {
        let path = env::temp_dir().join(format!("receval-store-{}.csv", std::process::id()));

        let mut writer = csv::Writer::from_path(&path).unwrap();
        for rating in store().ratings().unwrap().data() {
            writer.serialize(rating).unwrap();
        }
        writer.flush().unwrap();

        let csv_store = CsvRatingStore::from_path(&path).unwrap();
        assert_eq!(csv_store.count().unwrap(), store().count().unwrap());
        assert_eq!(
            csv_store.most_rating_users(3, 0).unwrap(),
            store().most_rating_users(3, 0).unwrap()
        );

        fs::remove_file(path).ok();
    }
}
