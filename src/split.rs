//! Partitioning of rating data into train and test sets: the data
//! cleaner, the per-user leave-latest-out splitter, and the seeded user
//! shuffling behind both the single 70/30 holdout and k-fold
//! cross-validation.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use crate::data::{Rating, Ratings};
use crate::UserId;

/// Seed for the user shuffle unless overridden on the runner. Sweeps
/// comparing hyperparameters across runs rely on every run seeing the
/// same partition.
pub const DEFAULT_SEED: u64 = 42;

/// Disjoint train and test observation sets produced by the splitter.
#[derive(Clone, Debug)]
pub struct Split {
    /// Observations models are fitted on.
    pub train: Ratings,
    /// Held-out observations metrics are scored against.
    pub test: Ratings,
}

/// Drop every user whose observation count is not strictly greater than
/// `min_ratings`. Retained observations are passed through unmodified.
pub fn clean_ratings(ratings: &Ratings, min_ratings: usize) -> Ratings {
    debug!(min_ratings, "dropping users with too few ratings");

    let counts = ratings.counts_per_user();
    let keep: HashSet<UserId> = counts
        .iter()
        .filter(|&(_, &count)| count > min_ratings)
        .map(|(&user, _)| user)
        .collect();

    let cleaned = ratings.filter_users(&keep);
    debug!(
        before = ratings.len(),
        after = cleaned.len(),
        "cleaned ratings"
    );

    cleaned
}

/// Split `ratings` into train and test sets: each test-cohort user has
/// their `min_rank` most recent observations held out, with anything
/// beyond that cutoff folded back into the train set so the model still
/// has something to learn from that user. Train-cohort users contribute
/// all their observations to the train set; users in neither cohort are
/// excluded.
///
/// Observations are ordered newest-first per user with a stable sort;
/// equal timestamps are broken by descending item id, so the same
/// inputs always produce the same split.
pub fn leave_latest_out_split(
    min_rank: usize,
    ratings: &Ratings,
    test_users: &HashSet<UserId>,
    train_users: &HashSet<UserId>,
) -> Split {
    let mut train: Vec<Rating> = ratings
        .data()
        .iter()
        .filter(|x| train_users.contains(&x.user_id()))
        .cloned()
        .collect();

    let mut pool: Vec<Rating> = ratings
        .data()
        .iter()
        .filter(|x| test_users.contains(&x.user_id()))
        .cloned()
        .collect();
    pool.sort_by(|a, b| {
        a.user_id()
            .cmp(&b.user_id())
            .then(b.timestamp().cmp(&a.timestamp()))
            .then(b.item_id().cmp(&a.item_id()))
    });

    let mut test = Vec::new();
    let mut current: Option<UserId> = None;
    let mut taken = 0;

    for rating in pool {
        if current != Some(rating.user_id()) {
            current = Some(rating.user_id());
            taken = 0;
        }

        if taken < min_rank {
            test.push(rating);
            taken += 1;
        } else {
            train.push(rating);
        }
    }

    Split {
        train: Ratings::from(train),
        test: Ratings::from(test),
    }
}

/// Distinct users of `ratings`, shuffled with a fixed seed. The same
/// seed and data always yield the same order.
pub fn shuffled_users(ratings: &Ratings, seed: u64) -> Vec<UserId> {
    let mut users = ratings.unique_users();
    let mut rng = StdRng::seed_from_u64(seed);
    users.shuffle(&mut rng);
    users
}

/// Take the first `train_pct` percent of `users` as the train cohort
/// and the remainder as the test cohort. Integer percentage arithmetic,
/// truncating.
pub fn holdout_user_split(users: &[UserId], train_pct: usize) -> (Vec<UserId>, Vec<UserId>) {
    let cutoff = users.len() * train_pct / 100;
    (users[..cutoff].to_vec(), users[cutoff..].to_vec())
}

/// Partition `users` into `folds` contiguous (train cohort, test
/// cohort) pairs. The first `users.len() % folds` test cohorts are one
/// user larger; every user lands in exactly one test cohort. Shuffle
/// the users first for unbiased folds.
pub fn user_folds(users: &[UserId], folds: usize) -> Vec<(Vec<UserId>, Vec<UserId>)> {
    let base = users.len() / folds;
    let extra = users.len() % folds;

    let mut out = Vec::with_capacity(folds);
    let mut start = 0;

    for fold in 0..folds {
        let stop = start + base + usize::from(fold < extra);

        let test = users[start..stop].to_vec();
        let train = users[..start]
            .iter()
            .chain(users[stop..].iter())
            .cloned()
            .collect();

        out.push((train, test));
        start = stop;
    }

    out
}
