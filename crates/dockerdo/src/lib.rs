//! # dockerdo
//!
//! Use your local dev tools for remote docker development.
//!
//! ## Architecture
//!
//! This is Layer 3 - the command line binary that ties together:
//! - dockerdo-core: Session record, config, errors, output sink
//! - dockerdo-shell: Command gateway and SSH tunnel
//! - dockerdo-session: Session store, reconciler and lifecycle actions

#![warn(clippy::all)]

pub mod cli;

use std::path::Path;

use tracing::error;
use tracing_subscriber::EnvFilter;

use dockerdo_core::{
    user_config_path, Error, Reporter, Result, Session, TerminalReporter, UserConfig,
};
use dockerdo_session::{Actions, BuildOptions, RunOptions};
use dockerdo_shell::{ExecutionContext, Gateway, SystemRunner};

pub use cli::{Cli, Commands};

/// Level used when neither `RUST_LOG` nor `-v` say otherwise.
pub fn log_level(verbose: bool, config: Option<&UserConfig>) -> String {
    if verbose {
        "debug".to_string()
    } else {
        config.map_or_else(|| "warn".to_string(), |c| c.log_level.clone())
    }
}

/// Send `tracing` output to stderr; `RUST_LOG` overrides `level`.
pub fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Run one dockerdo invocation from `cwd` and return the process exit code.
pub fn run(cli: Cli, cwd: &Path) -> i32 {
    let config = UserConfig::load_or_default(&user_config_path());
    init_logging(&log_level(cli.verbose, config.as_ref().ok()));

    let reporter = TerminalReporter;
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            reporter.error(&e.to_string());
            return 1;
        }
    };

    let runner = SystemRunner;
    let ctx = ExecutionContext::new(cli.verbose, cli.dry_run);
    let actions = Actions::new(Gateway::new(ctx, &runner, &reporter), config);

    match dispatch(&actions, cli.command, cli.session_dir.as_deref(), cwd) {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "command failed");
            reporter.error(&e.to_string());
            1
        }
    }
}

/// Route a subcommand to its action.
///
/// Every subcommand but `init` needs the session in `session_dir`.
pub fn dispatch(
    actions: &Actions<'_>,
    command: Commands,
    session_dir: Option<&Path>,
    cwd: &Path,
) -> Result<i32> {
    let load = || -> Result<Session> {
        let dir = session_dir.ok_or(Error::MissingSessionDir)?;
        actions.store().load(dir)
    };

    match command {
        Commands::Init(args) => actions.init(args.into(), cwd),
        Commands::Build { remote, file } => {
            actions.build(&mut load()?, BuildOptions { remote, file })
        }
        Commands::Run {
            no_default_args,
            ssh_port_on_remote_host,
            detach,
            docker_run_args,
        } => actions.run(
            &mut load()?,
            RunOptions {
                docker_run_args,
                no_default_args,
                ssh_port: ssh_port_on_remote_host,
                detach,
            },
        ),
        Commands::Export { key_value } => actions.export(&mut load()?, &key_value),
        Commands::Exec { args } => actions.exec(&load()?, &args, cwd),
        Commands::Status if session_dir.is_none() => actions.status_without_session(),
        Commands::Status => actions.status(&mut load()?),
        Commands::Stop => actions.stop(&mut load()?),
        Commands::History => actions.history(&load()?),
        Commands::Rm => actions.rm(&mut load()?),
    }
}
