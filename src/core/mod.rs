//! Core data types for GL string handling and match grading.
//!
//! This module provides the fundamental types used throughout the library:
//!
//! - [`Allele`]: A canonical `<locus>*<fields>` allele identifier
//! - [`GenotypeList`], [`Genotype`], [`Haplotype`], [`AlleleList`]: the
//!   nested ambiguity tree mirroring the GL-string grammar
//! - [`DetailRace`], [`BroadRace`], [`Population`]: population context for
//!   frequency lookup
//! - [`MatchGrade`], [`MatchResult`]: result classification types
//!
//! ## GL string grammar
//!
//! | Delimiter | Meaning |
//! |-----------|---------------------------------|
//! | `/`       | alternative alleles             |
//! | `~`       | phased allele lists             |
//! | `+`       | the two copies of a genotype    |
//! | `\|`      | alternative genotypes           |
//! | `^`       | joins loci                      |
//!
//! Alleles compare by **exact string identity** after pipeline
//! normalization; no fuzzy name equivalence is applied here.

pub mod allele;
pub mod genotype;
pub mod population;
pub mod types;

pub use allele::Allele;
pub use genotype::{AlleleList, Genotype, GenotypeList, Haplotype};
pub use population::{BroadRace, DetailRace, Population};
pub use types::{MatchGrade, MatchProbabilities, MatchResult};
