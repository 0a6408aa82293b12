use clap::Parser;
use tracing_subscriber::EnvFilter;

use tce_match::cli;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Initialize logging based on verbosity flag
    let filter = if cli.verbose {
        EnvFilter::new("tce_match=debug,info")
    } else {
        EnvFilter::new("tce_match=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        cli::Commands::Normalize(args) => {
            cli::normalize::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Match(args) => {
            cli::match_cmd::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Group(args) => {
            cli::group::run(args, cli.format, cli.verbose)?;
        }
    }

    Ok(())
}
