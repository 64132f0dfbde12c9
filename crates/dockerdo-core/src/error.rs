//! Error types for dockerdo.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for dockerdo operations.
#[derive(Debug, Error)]
pub enum Error {
    /// `$DOCKERDO_SESSION_DIR` is not set
    #[error("$DOCKERDO_SESSION_DIR is not set. Did you source the activate script?")]
    MissingSessionDir,

    /// No session record in the given directory
    #[error("Session not found: {0}")]
    SessionNotFound(PathBuf),

    /// Session record exists but cannot be parsed
    #[error("Corrupt session record {path}: {reason}")]
    CorruptSession {
        /// Path of the record file
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// Refusing to initialize over an existing session
    #[error("Session directory already exists: {0}")]
    SessionExists(PathBuf),

    /// `export` argument is not `KEY=VALUE`
    #[error("Invalid key=value format: {0}")]
    InvalidKeyValue(String),

    /// `build` without a Dockerfile
    #[error("No Dockerfile found in {0}")]
    MissingDockerfile(PathBuf),

    /// `run` before `build`
    #[error("Must 'dockerdo build' first")]
    ImageNotBuilt,

    /// `run` while the session believes the container is up
    #[error("Container is expected to be already running")]
    ContainerAlreadyRunning,

    /// Container command requested outside the container mount point
    #[error("Current working directory {cwd} is not inside the container mount point {mount_point}")]
    NotInMount {
        /// Working directory that was checked
        cwd: PathBuf,
        /// Container mount point of the session
        mount_point: PathBuf,
    },

    /// Remote host command requested for a local-only session
    #[error("Session has no remote host")]
    NoRemoteHost,

    /// Container SSH port has not been assigned yet
    #[error("Container has not been started: no SSH port assigned")]
    ContainerNotStarted,

    /// Command string cannot be split into arguments
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Subprocess could not be launched at all
    #[error("Failed to launch {program}: {source}")]
    Launch {
        /// Program that failed to start
        program: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a launch error for `program`.
    pub fn launch(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Launch {
            program: program.into(),
            source,
        }
    }

    /// Whether this error was raised before any subprocess was started.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Error::MissingDockerfile(_)
                | Error::ImageNotBuilt
                | Error::ContainerAlreadyRunning
                | Error::NotInMount { .. }
                | Error::NoRemoteHost
                | Error::ContainerNotStarted
        )
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
