//! `liquify` - changelog format converter.
//!
//! See `README.md` for user documentation and `DESIGN.md` for architecture.

use anyhow::Result;
use clap::Parser;
use clap::error::ErrorKind;
use tracing_subscriber::EnvFilter;

use liquify::arguments::print_usage;
use liquify::cli::Cli;
use liquify::exit_codes::exit;

fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(_) => {
            print_usage();
            std::process::exit(exit::SUCCESS);
        }
    };

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let exit_code = if cli.print_event_schema {
        println!("{}", liquify::events::generate_schema());
        exit::SUCCESS
    } else {
        liquify::engine::run(&cli)?
    };
    std::process::exit(exit_code);
}
