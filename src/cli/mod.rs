//! CLI surface: a thin command tree over the replay driver.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::config::Config;
use crate::Result;

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "claimtrie",
    version,
    about = "Authenticated claim registry replay tool",
    arg_required_else_help = true
)]
pub struct Cli {
    /// Config file (default: ./claimtrie.toml or $CLAIMTRIE_CONFIG).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Data directory holding the repositories (overrides config).
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Debug output (repeat for more).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay the change log, validating the root hash at every height.
    Replay(ReplayArgs),
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Final height to replay through (overrides config).
    #[arg(long, value_name = "HEIGHT")]
    pub target: Option<i32>,

    /// Resume from this height using its recorded root hash.
    #[arg(long, value_name = "HEIGHT")]
    pub start: Option<i32>,
}

pub fn parse_from<I, T>(args: I) -> Cli
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::parse_from(args)
}

pub fn run(cli: Cli, config: Config) -> Result<()> {
    let mut config = config;
    if let Some(dir) = cli.data_dir {
        config.data_dir = Some(dir);
    }
    match cli.command {
        Commands::Replay(args) => commands::replay::handle(&config, args),
    }
}
