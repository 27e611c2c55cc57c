//! Rating observations and the in-memory collections the harness
//! evaluates over.

use std::collections::{BTreeMap, HashMap, HashSet};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::{ItemId, Timestamp, UserId};

/// A single (user, item, rating, timestamp) observation. Immutable once
/// fetched from the store.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Rating {
    user_id: UserId,
    item_id: ItemId,
    rating: f32,
    timestamp: Timestamp,
}

impl Rating {
    /// Create a new rating observation.
    pub fn new(user_id: UserId, item_id: ItemId, rating: f32, timestamp: Timestamp) -> Self {
        Rating {
            user_id,
            item_id,
            rating,
            timestamp,
        }
    }

    /// The user who made the observation.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// The rated item.
    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    /// The rating value.
    pub fn rating(&self) -> f32 {
        self.rating
    }

    /// When the rating was made.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

/// A tabular, owned collection of rating observations together with the
/// distinct user and item cardinalities of the data it holds.
#[derive(Clone, Debug, Default)]
pub struct Ratings {
    num_users: usize,
    num_items: usize,
    ratings: Vec<Rating>,
}

impl Ratings {
    /// A collection with no observations.
    pub fn empty() -> Self {
        Ratings::default()
    }

    /// The underlying observations.
    pub fn data(&self) -> &[Rating] {
        &self.ratings
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    /// Whether the collection holds no observations.
    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    /// Number of distinct users.
    pub fn num_users(&self) -> usize {
        self.num_users
    }

    /// Number of distinct items.
    pub fn num_items(&self) -> usize {
        self.num_items
    }

    /// (distinct users, distinct items).
    pub fn shape(&self) -> (usize, usize) {
        (self.num_users, self.num_items)
    }

    /// Observations belonging to the given users.
    pub fn filter_users(&self, users: &HashSet<UserId>) -> Self {
        Ratings::from(
            self.ratings
                .iter()
                .filter(|x| users.contains(&x.user_id()))
                .cloned()
                .collect::<Vec<_>>(),
        )
    }

    /// Distinct user ids in order of first appearance.
    pub fn unique_users(&self) -> Vec<UserId> {
        self.ratings.iter().map(|x| x.user_id()).unique().collect()
    }

    /// Observation counts keyed by user.
    pub fn counts_per_user(&self) -> HashMap<UserId, usize> {
        let mut counts = HashMap::new();
        for rating in &self.ratings {
            *counts.entry(rating.user_id()).or_insert(0) += 1;
        }
        counts
    }

    /// Group the observations per user. The index is recomputed on
    /// every call and never persisted.
    pub fn by_user(&self) -> UserIndex {
        UserIndex::from(self)
    }
}

impl From<Vec<Rating>> for Ratings {
    fn from(data: Vec<Rating>) -> Ratings {
        let num_users = data.iter().map(|x| x.user_id()).unique().count();
        let num_items = data.iter().map(|x| x.item_id()).unique().count();

        Ratings {
            num_users,
            num_items,
            ratings: data,
        }
    }
}

/// Observations grouped by user, each user's slice in chronological
/// order (ties broken by item id). Users iterate in ascending id order.
#[derive(Clone, Debug, Default)]
pub struct UserIndex {
    users: BTreeMap<UserId, Vec<Rating>>,
}

impl<'a> From<&'a Ratings> for UserIndex {
    fn from(ratings: &'a Ratings) -> UserIndex {
        let mut users: BTreeMap<UserId, Vec<Rating>> = BTreeMap::new();

        for rating in ratings.data() {
            users
                .entry(rating.user_id())
                .or_default()
                .push(rating.clone());
        }

        for history in users.values_mut() {
            history.sort_by_key(|x| (x.timestamp(), x.item_id()));
        }

        UserIndex { users }
    }
}

impl UserIndex {
    /// The user's observations, oldest first, or `None` for a user with
    /// no observations.
    pub fn get(&self, user_id: UserId) -> Option<&[Rating]> {
        self.users.get(&user_id).map(|x| x.as_slice())
    }

    /// Iterate over (user, observations) pairs in ascending user order.
    pub fn iter(&self) -> impl Iterator<Item = (UserId, &[Rating])> + '_ {
        self.users.iter().map(|(&user, data)| (user, data.as_slice()))
    }

    /// Number of users in the index.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Whether the index holds no users.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Ratings {
        Ratings::from(vec![
            Rating::new(7, 1, 4.0, 30),
            Rating::new(3, 2, 3.0, 10),
            Rating::new(7, 3, 5.0, 10),
            Rating::new(3, 1, 2.0, 20),
            Rating::new(7, 2, 1.0, 10),
        ])
    }

    #[test]
    fn shape_counts_distinct_ids() {
        let ratings = sample();
        assert_eq!(ratings.shape(), (2, 3));
        assert_eq!(ratings.len(), 5);
    }

    #[test]
    fn empty_ratings_do_not_panic() {
        let ratings = Ratings::from(Vec::new());
        assert!(ratings.is_empty());
        assert_eq!(ratings.shape(), (0, 0));
        assert!(ratings.unique_users().is_empty());
        assert!(ratings.by_user().is_empty());
    }

    #[test]
    fn unique_users_keep_first_appearance_order() {
        assert_eq!(sample().unique_users(), vec![7, 3]);
    }

    #[test]
    fn filter_users_keeps_only_matching_rows() {
        let filtered = sample().filter_users(&[3].iter().cloned().collect());
        assert_eq!(filtered.len(), 2);
        assert!(filtered.data().iter().all(|x| x.user_id() == 3));
    }

    #[test]
    fn user_index_sorts_chronologically_with_item_tiebreak() {
        let index = sample().by_user();
        let history = index.get(7).unwrap();

        let order: Vec<(Timestamp, ItemId)> = history
            .iter()
            .map(|x| (x.timestamp(), x.item_id()))
            .collect();
        assert_eq!(order, vec![(10, 2), (10, 3), (30, 1)]);
    }
}
