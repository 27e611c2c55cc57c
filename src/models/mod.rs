//! Reference model families for exercising the harness.
//!
//! The evaluation loop depends only on the capability traits in the
//! crate root; trainable families (neighborhood, factorization,
//! ranking, hybrid) live with the applications that own them. The
//! memory-less popularity family ships here because sweeps and tests
//! need at least one real recommender.

pub mod popularity;
