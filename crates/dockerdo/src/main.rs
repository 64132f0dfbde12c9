//! # dockerdo
//!
//! Run commands from your local shell inside a docker container on a remote
//! host, with the build directory and the container filesystem mounted over
//! sshfs.

use anyhow::Context;
use clap::Parser;
use dockerdo::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir().context("cannot read the current directory")?;
    let code = dockerdo::run(cli, &cwd);
    tracing::debug!("dockerdo exiting with code {}", code);
    std::process::exit(code);
}
