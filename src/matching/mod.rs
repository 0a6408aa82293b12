//! The match probability engine.
//!
//! This module provides the core matching functionality:
//!
//! - [`MatchEngine`]: main entry point computing a [`crate::core::MatchResult`]
//!   for a recipient/donor GL string pair
//! - [`AllelePair`]: canonically-ordered pair expansion from a genotype tree
//! - [`TraceCollector`]: call-scoped, human-readable evaluation log
//!
//! ## Algorithm
//!
//! Both GL strings are pipeline-normalized, parsed into ambiguity trees,
//! and expanded into deduplicated allele-pair sets. Each pair is weighted
//! by population allele frequency; zero-weight pairs are dropped. Every
//! recipient×donor combination is graded and its weight product
//! accumulated into a five-outcome distribution, which is normalized,
//! rounded, and reported together with a single priority-picked grade.

pub mod engine;
pub mod pairs;
pub mod trace;

use thiserror::Error;

use crate::core::genotype::GlParseError;
use crate::pipeline::PipelineError;
use crate::utils::limits::LimitError;

pub use engine::{EngineConfig, MatchEngine, MatchQuery, MatchReport};
pub use pairs::AllelePair;
pub use trace::TraceCollector;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Parse(#[from] GlParseError),

    #[error(transparent)]
    Limit(#[from] LimitError),

    #[error("{side} genotype carries no alleles at locus {locus}")]
    NoAllelesAtLocus { side: &'static str, locus: String },
}

impl MatchError {
    /// True for errors a boundary layer should map to a bad-request kind
    pub fn is_malformed_input(&self) -> bool {
        match self {
            Self::Pipeline(e) => e.is_malformed_input(),
            Self::Parse(_) | Self::Limit(_) | Self::NoAllelesAtLocus { .. } => true,
        }
    }
}
