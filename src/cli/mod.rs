//! Command-line interface for tce-match.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **normalize**: Run a GL string through the normalization pipeline
//! - **match**: Grade a recipient/donor pair and compute match probabilities
//! - **group**: Resolve an allele's TCE group, or list a group's alleles
//!
//! ## Usage
//!
//! ```text
//! # Normalize a GL string against the reference tables
//! tce-match normalize --tables data/ "HLA-DPB1*01:AFC+04:01"
//!
//! # Grade a pair with population-weighted probabilities
//! tce-match match --tables data/ \
//!     --recipient "HLA-DPB1*01:01+HLA-DPB1*04:01" --recipient-race CAU \
//!     --donor "HLA-DPB1*02:01+HLA-DPB1*04:01" --donor-race CAU
//!
//! # JSON output for scripting
//! tce-match match --tables data/ -r "01:01+04:01" -d "02:01+04:01" --format json
//!
//! # Which TCE group is this allele in?
//! tce-match group --tables data/ "HLA-DPB1*03:01:05"
//! ```

use clap::{Parser, Subcommand};

pub mod group;
pub mod match_cmd;
pub mod normalize;

#[derive(Parser)]
#[command(name = "tce-match")]
#[command(author = "Fulcrum Genomics")]
#[command(version)]
#[command(about = "Grade HLA-DPB1 TCE compatibility from GL strings")]
#[command(
    long_about = "tce-match grades HLA-DPB1 donor/recipient compatibility by T-cell epitope (TCE) group.\n\nGL strings are normalized (allele-code and G-group expansion), expanded into concrete allele pairs, and every recipient/donor combination is graded by comparing the lower TCE group on each side. With population frequency data the outcome is a five-way probability distribution; without it, a single composite grade."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Normalize a GL string through the rewrite pipeline
    Normalize(normalize::NormalizeArgs),

    /// Grade a recipient/donor pair and compute match probabilities
    Match(match_cmd::MatchArgs),

    /// Resolve TCE groups
    Group(group::GroupArgs),
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
