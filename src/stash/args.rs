use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "stash")]
#[command(about = "Inspect and maintain the independent stash save file", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Base data directory (the host's persistent data path)
    #[arg(long, global = true, env = "STASH_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print every file location the stash uses
    Paths,

    /// Summarize the stash file
    #[command(alias = "s")]
    Show {
        /// List every occupied slot
        #[arg(long)]
        items: bool,
    },

    /// Create the stash file if needed and move legacy data to the current key
    Migrate,

    /// Show the effective configuration
    Config {
        /// Write the default config file if none exists
        #[arg(long)]
        init: bool,
    },
}
