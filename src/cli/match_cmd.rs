use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;

use crate::cli::OutputFormat;
use crate::core::population::Population;
use crate::matching::{EngineConfig, MatchEngine, MatchQuery};
use crate::store::FileStore;

#[derive(Args)]
pub struct MatchArgs {
    /// Recipient GL string
    #[arg(short, long)]
    pub recipient: String,

    /// Recipient race code (broad or detail, e.g. CAU or EURCAU)
    #[arg(long)]
    pub recipient_race: Option<String>,

    /// Donor GL string
    #[arg(short, long)]
    pub donor: String,

    /// Donor race code (broad or detail)
    #[arg(long)]
    pub donor_race: Option<String>,

    /// Directory holding the reference tables
    #[arg(long)]
    pub tables: PathBuf,

    /// Decimal places in reported probabilities
    #[arg(long, default_value = "4")]
    pub precision: u32,

    /// Include the per-combination evaluation trace in the output
    #[arg(long)]
    pub trace: bool,
}

/// Execute match subcommand
///
/// # Errors
///
/// Returns an error if a GL string cannot be normalized or parsed, or if
/// a race code is unrecognized.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: MatchArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let store = Arc::new(FileStore::new(&args.tables));
    let config = EngineConfig {
        precision: args.precision,
        ..Default::default()
    };
    let engine = MatchEngine::new(store, config)?;

    let query = MatchQuery {
        recipient_gl: args.recipient.clone(),
        recipient_population: parse_population(args.recipient_race.as_deref())?,
        donor_gl: args.donor.clone(),
        donor_population: parse_population(args.donor_race.as_deref())?,
        trace: args.trace,
    };

    if verbose {
        eprintln!(
            "Matching {} ({:?}) vs {} ({:?})",
            query.recipient_gl, query.recipient_population, query.donor_gl, query.donor_population
        );
    }

    let report = engine.compute(&query)?;

    match format {
        OutputFormat::Text => {
            println!("Grade: {}", report.result.grade);
            if let Some(p) = &report.result.probabilities {
                println!("  match:              {:.*}", args.precision as usize, p.match_);
                println!(
                    "  permissive:         {:.*}",
                    args.precision as usize, p.permissive
                );
                println!(
                    "  hvg_non_permissive: {:.*}",
                    args.precision as usize, p.hvg_non_permissive
                );
                println!(
                    "  gvh_non_permissive: {:.*}",
                    args.precision as usize, p.gvh_non_permissive
                );
                println!(
                    "  unknown:            {:.*}",
                    args.precision as usize, p.unknown
                );
            } else {
                println!("  (no usable frequency data; grade only)");
            }
            if let Some(lines) = &report.trace {
                println!("\nTrace:");
                for line in lines {
                    println!("  {line}");
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn parse_population(code: Option<&str>) -> anyhow::Result<Population> {
    match code {
        None => Ok(Population::Unknown),
        Some(code) => Population::parse(code)
            .ok_or_else(|| anyhow::anyhow!("unrecognized race code '{code}'")),
    }
}
