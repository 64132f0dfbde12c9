//! Session record for one dockerdo working context.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Lifecycle state of the session's container, as last known to dockerdo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    /// No container exists
    #[default]
    Nothing,
    /// Container is running
    Running,
    /// Container exists but is not running
    Stopped,
}

impl ContainerState {
    /// Lowercase name, as stored in the session record.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerState::Nothing => "nothing",
            ContainerState::Running => "running",
            ContainerState::Stopped => "stopped",
        }
    }

    /// Map a Docker engine `State` value onto the session lifecycle.
    ///
    /// Returns `None` for states dockerdo does not know how to interpret.
    pub fn from_docker(state: &str) -> Option<Self> {
        match state {
            "running" => Some(ContainerState::Running),
            "exited" | "paused" | "dead" | "restarting" | "created" => {
                Some(ContainerState::Stopped)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted state of a dockerdo session.
///
/// Mount points are derived from `local_work_dir` and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Session name (`ephemeral` for unnamed sessions)
    pub name: String,
    /// Docker container name
    pub container_name: String,
    /// Remote docker host; `None` when docker runs on the local host
    #[serde(default)]
    pub remote_host: Option<String>,
    /// Host port forwarded to the container's sshd, assigned by `run`
    #[serde(default)]
    pub ssh_port_on_remote_host: Option<u16>,
    /// User to log in as inside the container
    pub container_username: String,
    /// Image the session image is derived from
    pub base_image: String,
    /// Registry prefix for the image tag
    #[serde(default)]
    pub docker_registry: Option<String>,
    /// Tag of the built image, set by `build`
    #[serde(default)]
    pub image_tag: Option<String>,
    /// Default extra `docker run` arguments
    #[serde(default)]
    pub docker_run_args: Option<String>,
    /// Directory holding the record, control socket and history
    pub session_dir: PathBuf,
    /// Build directory on the remote host
    pub remote_host_build_dir: PathBuf,
    /// Local directory under which the sshfs mount points live
    pub local_work_dir: PathBuf,
    /// Last known container lifecycle state
    #[serde(default)]
    pub container_state: ContainerState,
    /// Environment exported into the container
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Files modified inside the container
    #[serde(default)]
    pub modified_files: BTreeSet<PathBuf>,
    /// Whether filesystem events should be recorded
    #[serde(default)]
    pub record_inotify: bool,
    /// Pid of the SSH master process started by `run`
    #[serde(default)]
    pub ssh_master_pid: Option<u32>,
}

/// Values needed to create a new session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Session name
    pub name: String,
    /// Container name
    pub container_name: String,
    /// Remote docker host
    pub remote_host: Option<String>,
    /// Container user
    pub container_username: String,
    /// Base image
    pub base_image: String,
    /// Registry prefix
    pub docker_registry: Option<String>,
    /// Default `docker run` arguments
    pub docker_run_args: Option<String>,
    /// Session directory
    pub session_dir: PathBuf,
    /// Remote build directory
    pub remote_host_build_dir: PathBuf,
    /// Local work directory
    pub local_work_dir: PathBuf,
    /// Record filesystem events
    pub record_inotify: bool,
}

impl Session {
    /// File name of the session record inside `session_dir`.
    pub const RECORD_FILE: &'static str = "session.yaml";

    /// Create a fresh session with no container.
    pub fn new(opts: SessionOptions) -> Self {
        Self {
            name: opts.name,
            container_name: opts.container_name,
            remote_host: opts.remote_host,
            ssh_port_on_remote_host: None,
            container_username: opts.container_username,
            base_image: opts.base_image,
            docker_registry: opts.docker_registry,
            image_tag: None,
            docker_run_args: opts.docker_run_args,
            session_dir: opts.session_dir,
            remote_host_build_dir: opts.remote_host_build_dir,
            local_work_dir: opts.local_work_dir,
            container_state: ContainerState::Nothing,
            env: BTreeMap::new(),
            modified_files: BTreeSet::new(),
            record_inotify: opts.record_inotify,
            ssh_master_pid: None,
        }
    }

    /// Path of the session record file.
    pub fn record_path(&self) -> PathBuf {
        self.session_dir.join(Self::RECORD_FILE)
    }

    /// Path of the SSH control socket shared by all remote commands.
    pub fn ssh_socket(&self) -> PathBuf {
        self.session_dir.join("ssh-socket")
    }

    /// Path of the activation script.
    pub fn activate_script(&self) -> PathBuf {
        self.session_dir.join("activate")
    }

    /// Path of the command history file.
    pub fn command_history_path(&self) -> PathBuf {
        self.session_dir.join("command_history")
    }

    /// Path of the `docker run --env-file` list.
    pub fn env_list_path(&self) -> PathBuf {
        self.session_dir.join("env.list")
    }

    /// Where the remote build directory is mounted locally.
    pub fn sshfs_remote_mount_point(&self) -> Option<PathBuf> {
        self.remote_host
            .as_ref()
            .map(|host| self.local_work_dir.join(host))
    }

    /// Where the container filesystem is mounted locally.
    pub fn sshfs_container_mount_point(&self) -> PathBuf {
        self.local_work_dir.join("container")
    }

    /// Host that forwards the container's SSH port.
    pub fn ssh_host(&self) -> &str {
        self.remote_host.as_deref().unwrap_or("localhost")
    }

    /// Home directory of the container user.
    pub fn container_homedir(&self) -> PathBuf {
        if self.container_username == "root" {
            PathBuf::from("/root")
        } else {
            Path::new("/home").join(&self.container_username)
        }
    }

    /// Set an exported environment variable.
    pub fn export(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env.insert(key.into(), value.into());
    }

    /// Record a file modified inside the container.
    pub fn record_modified_file(&mut self, path: impl Into<PathBuf>) {
        self.modified_files.insert(path.into());
    }

    /// Whether the session believes its container is running.
    pub fn is_running(&self) -> bool {
        self.container_state == ContainerState::Running
    }

    /// Render `env` as `KEY=VALUE` lines sorted by key.
    pub fn format_env_list(&self) -> String {
        self.env
            .iter()
            .map(|(key, value)| format!("{key}={value}\n"))
            .collect()
    }

    /// Render the record as YAML with the given top-level keys removed.
    pub fn to_yaml_excluding(&self, exclude: &[&str]) -> crate::Result<String> {
        let mut value = serde_yaml::to_value(self)?;
        if let serde_yaml::Value::Mapping(map) = &mut value {
            for key in exclude {
                map.remove(*key);
            }
        }
        Ok(serde_yaml::to_string(&value)?)
    }
}
