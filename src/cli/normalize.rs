use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;

use crate::cache::CacheSettings;
use crate::cli::OutputFormat;
use crate::pipeline::stages::{canonical_pipeline, PipelineConfig};
use crate::store::FileStore;

#[derive(Args)]
pub struct NormalizeArgs {
    /// GL string to normalize
    #[arg(required = true)]
    pub gl: String,

    /// Directory holding the reference tables
    #[arg(long)]
    pub tables: PathBuf,

    /// Locus assumed for tokens that carry none
    #[arg(long, default_value = "HLA-DPB1")]
    pub locus: String,
}

/// Execute normalize subcommand
///
/// # Errors
///
/// Returns an error if the GL string is malformed or references an
/// unrecognized allele code.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: NormalizeArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let store = Arc::new(FileStore::new(&args.tables));
    let config = PipelineConfig {
        default_locus: Some(args.locus.clone()),
        ..Default::default()
    };
    let pipeline = canonical_pipeline(store, &config, &CacheSettings::default());

    if verbose {
        eprintln!("Normalizing against tables in {}", args.tables.display());
    }

    let normalized = pipeline.normalize(&args.gl)?;

    match format {
        OutputFormat::Text => println!("{normalized}"),
        OutputFormat::Json => {
            let output = serde_json::json!({
                "input": args.gl,
                "normalized": normalized,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
