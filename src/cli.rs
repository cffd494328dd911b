use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "deepclean",
    about = "Windows deep cleanup: temp, caches, logs, update leftovers and more",
    version
)]
pub struct Cli {
    /// TOML file overriding drives, service names and timeouts
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Open the desktop window (default)
    Gui,

    /// Run all 18 steps in this terminal
    Run {
        /// Answer yes to the shadow copy, hibernation and pagefile prompts
        #[arg(long, conflicts_with = "skip_dangerous")]
        assume_yes: bool,

        /// Answer no to the shadow copy, hibernation and pagefile prompts
        #[arg(long)]
        skip_dangerous: bool,
    },

    /// Print the step catalog and the folders each step touches
    List,
}
