//! # dockerdo-core
//!
//! Core types for dockerdo.
//!
//! This crate contains all fundamental types with **no internal dependencies**
//! on other dockerdo crates. It provides:
//!
//! - The persisted session record and its lifecycle state
//! - User configuration loaded from YAML
//! - Mount point path translation (local ↔ remote build dir / container)
//! - Image tag and container name helpers
//! - The terminal output sink used for user-facing messages
//! - Error types
//!
//! ## Architecture
//!
//! This is Layer 0 in the architecture - all other crates depend on this one,
//! but this crate has no dependencies on other dockerdo crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod mount;
pub mod naming;
pub mod report;
pub mod session;

// Re-export commonly used types
pub use config::{user_config_dir, user_config_path, UserConfig};
pub use error::{Error, Result};
pub use mount::{container_work_dir, normalize_lexically, remote_work_dir};
pub use naming::{ephemeral_container_name, make_image_tag};
pub use report::{format_action, format_bullet, MemoryReporter, Report, Reporter, TerminalReporter};
pub use session::{ContainerState, Session, SessionOptions};
