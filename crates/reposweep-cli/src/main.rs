//! reposweep - downloads GitHub repositories, extracts them safely and runs
//! a static analysis scanner over each one.

mod cli;
mod error;
mod logging;
mod output;
mod sweep;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    logging::setup_logging(cli.debug);

    let reporter = output::create_reporter(cli.json, cli.files);
    sweep::run(&cli, reporter)?;
    Ok(())
}
