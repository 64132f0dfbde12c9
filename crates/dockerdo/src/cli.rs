//! Command line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use dockerdo_session::InitOptions;

#[derive(Debug, Parser)]
#[command(name = "dockerdo")]
#[command(about = "Use your local dev tools for remote docker development")]
#[command(version)]
pub struct Cli {
    /// Echo every command before running it
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print commands instead of running them
    #[arg(short = 'n', long, global = true)]
    pub dry_run: bool,

    /// Session directory, normally set by sourcing the activate script
    #[arg(long, env = "DOCKERDO_SESSION_DIR", global = true, hide = true)]
    pub session_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a session; prints the activate script path for `source $(dockerdo init)`
    Init(InitArgs),

    /// Build the session image from Dockerfile.dockerdo
    Build {
        /// Build on the remote host
        #[arg(long)]
        remote: bool,

        /// Dockerfile to use
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Start the container, open the SSH tunnel and mount its filesystem
    Run {
        /// Skip the default docker run arguments from the user config
        #[arg(long)]
        no_default_args: bool,

        /// Host port forwarded to the container's sshd
        #[arg(long)]
        ssh_port_on_remote_host: Option<u16>,

        /// Leave the SSH tunnel in the background and return
        #[arg(long)]
        detach: bool,

        /// Extra arguments passed to docker run
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        docker_run_args: Vec<String>,
    },

    /// Set an environment variable for commands run in the container
    Export {
        /// Variable as KEY=VALUE
        key_value: String,
    },

    /// Run a command in the container, in the directory matching the cwd
    Exec {
        /// Command and its arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Show the session, image, container and mount status
    Status,

    /// Stop the container and close the SSH tunnel
    Stop,

    /// Show recorded file modifications and the command history
    History,

    /// Remove the container
    Rm,
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Session name; an ephemeral session is created when omitted
    pub name: Option<String>,

    /// Container name
    #[arg(long)]
    pub container: Option<String>,

    /// Record filesystem events in the container
    #[arg(long)]
    pub record: bool,

    /// Remote docker host
    #[arg(long, conflicts_with = "local")]
    pub remote: Option<String>,

    /// Run docker on this machine even if a default remote host is configured
    #[arg(long)]
    pub local: bool,

    /// Base image
    #[arg(long)]
    pub image: Option<String>,

    /// User inside the container
    #[arg(long)]
    pub user: Option<String>,

    /// Docker registry
    #[arg(long)]
    pub registry: Option<String>,

    /// Build directory on the remote host
    #[arg(long)]
    pub build_dir: Option<PathBuf>,
}

impl From<InitArgs> for InitOptions {
    fn from(args: InitArgs) -> Self {
        Self {
            name: args.name,
            container: args.container,
            record: args.record,
            remote: args.remote,
            local: args.local,
            image: args.image,
            user: args.user,
            registry: args.registry,
            build_dir: args.build_dir,
        }
    }
}
