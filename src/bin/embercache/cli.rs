use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "embercache",
    version,
    about = "Read-optimized warm-up snapshot cache",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Build (or rebuild) the snapshot from a JSON object file
    Warm {
        /// Snapshot file path
        path: PathBuf,
        /// JSON file with one top-level object: key -> value
        #[arg(long)]
        input: PathBuf,
    },

    /// Look up a key in the snapshot
    Get {
        path: PathBuf,
        key: String,
        /// Print the value as JSON
        #[arg(long)]
        json: bool,
    },

    /// Reset the snapshot: empty memory state and delete the file
    Clear { path: PathBuf },

    /// Print snapshot summary
    Status {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
}
