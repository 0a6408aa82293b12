//! # tce-match
//!
//! A library for grading HLA-DPB1 donor/recipient compatibility by T-cell
//! epitope (TCE) group, with population-frequency-weighted match
//! probabilities.
//!
//! Unrelated-donor transplant pairs are rarely typed to full allele
//! resolution: a genotype arrives as a GL string carrying allele codes,
//! G-groups, and alternative genotypes. `tce-match` normalizes that
//! ambiguity away, expands both sides into concrete allele pairs, and
//! grades every recipient/donor combination by comparing the lower TCE
//! group on each side. When population allele-frequency data is available,
//! the combinations are weighted into a five-outcome probability
//! distribution; without it, a single composite grade is still reported.
//!
//! ## Features
//!
//! - **GL string normalization**: locus defaulting, NMDP allele-code and
//!   G-group expansion through a staged rewrite pipeline
//! - **TCE group resolution**: verbatim lookup with progressive field
//!   truncation, null alleles mapped to group 0
//! - **Frequency resolution**: detail-race tables with broad-race
//!   fallback, ARS-reduced lookup
//! - **Refresh-ahead caching**: reference tables are served stale while a
//!   worker pool reloads them in the background
//! - **Evaluation traces**: optional per-call log of every graded
//!   combination
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tce_match::store::FileStore;
//! use tce_match::{EngineConfig, MatchEngine, MatchQuery, Population};
//!
//! let store = Arc::new(FileStore::new("tables/"));
//! let engine = MatchEngine::new(store, EngineConfig::default()).unwrap();
//!
//! let report = engine
//!     .compute(&MatchQuery {
//!         recipient_gl: "HLA-DPB1*01:01+HLA-DPB1*04:AFC".to_string(),
//!         recipient_population: Population::parse("CAU").unwrap(),
//!         donor_gl: "HLA-DPB1*01:01+HLA-DPB1*04:01".to_string(),
//!         donor_population: Population::parse("CAU").unwrap(),
//!         trace: false,
//!     })
//!     .unwrap();
//!
//! println!("{}", report.result.grade);
//! ```
//!
//! ## Modules
//!
//! - [`core`]: alleles, genotypes, populations, and result types
//! - [`cache`]: the generic refresh-ahead cache
//! - [`store`]: the reference-table store trait and its file/memory backends
//! - [`pipeline`]: the GL string normalization pipeline
//! - [`resolver`]: TCE group and allele-frequency resolvers
//! - [`matching`]: the match probability engine
//! - [`cli`]: command-line interface implementation

pub mod cache;
pub mod cli;
pub mod core;
pub mod matching;
pub mod pipeline;
pub mod resolver;
pub mod store;
pub mod utils;

// Re-export commonly used types for convenience
pub use cache::{CacheSettings, CacheStats, RefreshingCache};
pub use core::allele::Allele;
pub use core::genotype::GenotypeList;
pub use core::population::Population;
pub use core::types::*;
pub use matching::{EngineConfig, MatchEngine, MatchQuery, MatchReport};
pub use resolver::{FrequencyResolver, GroupResolver};
