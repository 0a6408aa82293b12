use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;

use crate::cache::CacheSettings;
use crate::cli::OutputFormat;
use crate::resolver::GroupResolver;
use crate::store::FileStore;

#[derive(Args)]
pub struct GroupArgs {
    /// Allele to resolve (omit when using --list)
    pub allele: Option<String>,

    /// List all known alleles of one group instead
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=3))]
    pub list: Option<u8>,

    /// Directory holding the reference tables
    #[arg(long)]
    pub tables: PathBuf,
}

/// Execute group subcommand
///
/// # Errors
///
/// Returns an error if the group table cannot be loaded or neither an
/// allele nor --list was given.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: GroupArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let store = Arc::new(FileStore::new(&args.tables));
    let resolver = GroupResolver::new(store, &CacheSettings::default())?;

    if let Some(group) = args.list {
        let alleles = resolver.alleles_in_group(group);
        if verbose {
            eprintln!("{} allele(s) in group {group}", alleles.len());
        }
        match format {
            OutputFormat::Text => {
                for allele in &alleles {
                    println!("{allele}");
                }
            }
            OutputFormat::Json => {
                let output = serde_json::json!({ "group": group, "alleles": alleles });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
        }
        return Ok(());
    }

    let allele = args
        .allele
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("provide an allele, or --list <group>"))?;
    let group = resolver.resolve(allele);

    match format {
        OutputFormat::Text => match group {
            Some(group) => println!("{group}"),
            None => println!("unknown"),
        },
        OutputFormat::Json => {
            let output = serde_json::json!({ "allele": allele, "group": group });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
