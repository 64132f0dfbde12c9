//! # dockerdo-shell
//!
//! Command construction and execution for dockerdo.
//!
//! This crate provides:
//! - An explicit execution context (verbose echo, dry-run)
//! - A typed command builder producing argument vectors for three targets:
//!   the local host, the remote host, and the container
//! - The subprocess runner seam, with a system implementation and a scripted
//!   test double
//! - The SSH master process that keeps the control socket alive
//!
//! ## Architecture
//!
//! This is Layer 1 in the architecture - it depends on dockerdo-core only.
//! Nothing here reads or writes the session record; callers own persistence.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod command;
pub mod context;
pub mod gateway;
pub mod runner;
pub mod testing;
pub mod tunnel;

// Re-export commonly used types
pub use command::{join_args, split_args, CommandBuilder, Invocation, Target};
pub use context::ExecutionContext;
pub use gateway::Gateway;
pub use runner::{BackgroundProcess, CommandOutput, CommandRunner, SystemRunner};
pub use tunnel::{close_tunnel, master_invocation, open_tunnel, ForegroundTask};
