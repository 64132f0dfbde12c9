//! # dockerdo-session
//!
//! Session persistence and the lifecycle actions behind every dockerdo
//! subcommand.
//!
//! This crate provides:
//! - The session store: `session.yaml` plus the activate script, command
//!   history and env list side files
//! - Reconciliation of the cached container state against `docker ps`
//! - The actions: init, build, run, export, exec, status, stop, history, rm
//!
//! ## Architecture
//!
//! This is Layer 2 in the architecture - it depends on dockerdo-core and
//! dockerdo-shell. Actions load nothing themselves: the caller hands them a
//! session, and they persist it through the store when it changes.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod actions;
pub mod reconcile;
pub mod store;

// Re-export commonly used types
pub use actions::{
    default_session_root, parse_key_value, Actions, BuildOptions, InitOptions, RunOptions,
    DEFAULT_SSH_PORT,
};
pub use reconcile::{parse_ps_output, verify_container_state};
pub use store::SessionStore;
