//! Scrawl command-line entry point (native).

mod cli;

use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();

    let cli = cli::Cli::parse();
    match cli::run(&cli, &mut std::io::stdout()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("scrawl: {}", e);
            ExitCode::FAILURE
        }
    }
}
