use clap::Parser;
use clinical_ner_core::{NerError, Result};
use cli::{init_verbose, Cli, Command};
use std::process;
use tracing::error;

mod cli;
mod commands;

fn runner() -> Result<()> {
    let cli = Cli::parse();
    init_verbose(&cli);
    tracing::info!("Running clinical-ner-{}", env!("CARGO_PKG_VERSION"));
    match cli.command {
        Command::Train(args) => commands::train(args)?,
        Command::Predict(args) => commands::predict(args)?,
        Command::CrossValidate(args) => commands::cross_validate(args)?,
        Command::Demo(args) => commands::demo(args)?,
        Command::Info(args) => commands::info(args)?,
    }
    tracing::info!("clinical-ner-{} end", env!("CARGO_PKG_VERSION"));
    Ok(())
}

fn handle_error_and_exit(err: NerError) -> ! {
    error!("{}", err);
    process::exit(1);
}

fn main() {
    if let Err(e) = runner() {
        handle_error_and_exit(e);
    }
}
