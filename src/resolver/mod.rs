//! Resolvers over the allele store: immunogenicity groups and population
//! frequencies. Both are backed by a [`crate::cache::RefreshingCache`] so
//! repeated queries never touch the slow store directly.

pub mod frequency;
pub mod group;

pub use frequency::{FrequencyResolver, DEFAULT_BASELINE_FREQUENCY};
pub use group::{GroupResolver, GroupTable};
