mod client;
mod commands;
mod config;
mod logger;

use clap::{ColorChoice, Parser};
use colored::Colorize;
use commands::{Args, Commands};
use logger::Logger;
use std::{
    io::{IsTerminal, stderr},
    process,
};

static LOGGER: Logger = Logger;

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    colored::control::set_override(match args.color {
        ColorChoice::Always => true,
        ColorChoice::Auto => stderr().is_terminal(),
        ColorChoice::Never => false,
    });

    log::set_logger(&LOGGER).map_err(|e| anyhow::anyhow!("{}", e))?;
    log::set_max_level(args.log_level());

    match args.command {
        Commands::Resolve(args) => args.execute().await?,
        Commands::Unpack(args) => args.execute()?,
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{}: {}", "error".bold().red(), e);
        process::exit(1);
    }
}
