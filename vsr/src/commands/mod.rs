mod resolve;
mod unpack;

pub use resolve::Resolve;
pub use unpack::Unpack;

use clap::{ArgAction, ColorChoice, Parser, Subcommand};
use log::LevelFilter;

/// Resolve movie and episode references into playable stream sources.
#[derive(Debug, Clone, Parser)]
#[command(version, author = "clitic <clitic21@gmail.com>", about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// When to output colored text.
    #[arg(long, global = true, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Increase logging verbosity, `-vv` for trace output.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Error;
        }

        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    Resolve(Resolve),
    Unpack(Unpack),
}
