use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use log::error;

mod cli;
mod cmd_clear;
mod cmd_get;
mod cmd_status;
mod cmd_warm;

fn init_logger() {
    // Level comes from RUST_LOG, default info.
    // Example: RUST_LOG=debug ./embercache ...
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = run() {
        error!("{:?}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    match cli.cmd {
        cli::Cmd::Warm { path, input } => cmd_warm::exec(path, input),

        cli::Cmd::Get { path, key, json } => cmd_get::exec(path, key, json),

        cli::Cmd::Clear { path } => cmd_clear::exec(path),

        cli::Cmd::Status { path, json } => cmd_status::exec(path, json),
    }
}
