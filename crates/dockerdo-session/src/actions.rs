//! Lifecycle actions behind the dockerdo subcommands.
//!
//! Every action takes the loaded session, runs its commands through the
//! gateway and persists the session when it changed. A non-zero exit code
//! from docker, ssh or sshfs is returned as is and leaves the lifecycle
//! state alone. A dry run never writes the session record, except for
//! `init`, which has nothing to execute.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info};

use dockerdo_core::{
    ephemeral_container_name, make_image_tag, remote_work_dir, user_config_path, ContainerState,
    Error, Reporter, Result, Session, SessionOptions, UserConfig,
};
use dockerdo_shell::{
    close_tunnel, join_args, open_tunnel, split_args, ForegroundTask, Gateway, Invocation,
};

use crate::reconcile::verify_container_state;
use crate::store::SessionStore;

/// Host port forwarded to the container's sshd when `run` is given none.
pub const DEFAULT_SSH_PORT: u16 = 2222;

const DOCKERFILE_NAME: &str = "Dockerfile.dockerdo";
const EPHEMERAL_SESSION_NAME: &str = "ephemeral";
const TUNNEL_GRACE: Duration = Duration::from_secs(2);

lazy_static! {
    static ref ENV_KEY: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

/// Options of `init`.
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Session name; an ephemeral session is created when absent
    pub name: Option<String>,
    /// Container name; generated when absent
    pub container: Option<String>,
    /// Record filesystem events
    pub record: bool,
    /// Remote docker host
    pub remote: Option<String>,
    /// Run docker on the local host, ignoring the configured default
    pub local: bool,
    /// Base image
    pub image: Option<String>,
    /// Container user, `root` when absent
    pub user: Option<String>,
    /// Docker registry
    pub registry: Option<String>,
    /// Build directory on the remote host, `.` when absent
    pub build_dir: Option<PathBuf>,
}

/// Options of `build`.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Build on the remote host
    pub remote: bool,
    /// Dockerfile to use instead of `Dockerfile.dockerdo`
    pub file: Option<PathBuf>,
}

/// Options of `run`.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Extra `docker run` arguments
    pub docker_run_args: Vec<String>,
    /// Skip the default arguments from the user config
    pub no_default_args: bool,
    /// Host port for the container's sshd
    pub ssh_port: Option<u16>,
    /// Leave the SSH tunnel in the background instead of waiting on it
    pub detach: bool,
}

/// Where named sessions are kept: `<data dir>/dockerdo`.
pub fn default_session_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("dockerdo")
}

/// Split `KEY=VALUE` on the first `=` and check the key is a shell identifier.
pub fn parse_key_value(key_value: &str) -> Result<(String, String)> {
    let (key, value) = key_value
        .split_once('=')
        .ok_or_else(|| Error::InvalidKeyValue(key_value.to_string()))?;
    if !ENV_KEY.is_match(key) {
        return Err(Error::InvalidKeyValue(key_value.to_string()));
    }
    Ok((key.to_string(), value.to_string()))
}

/// The dockerdo actions, bound to one gateway and user configuration.
pub struct Actions<'a> {
    gateway: Gateway<'a>,
    store: SessionStore<'a>,
    config: UserConfig,
    config_path: PathBuf,
    session_root: PathBuf,
    ephemeral_root: PathBuf,
    tunnel_grace: Duration,
}

impl<'a> Actions<'a> {
    /// Create the actions with the default config path and session root.
    pub fn new(gateway: Gateway<'a>, config: UserConfig) -> Self {
        let store = SessionStore::new(gateway.reporter());
        Self {
            gateway,
            store,
            config,
            config_path: user_config_path(),
            session_root: default_session_root(),
            ephemeral_root: std::env::temp_dir(),
            tunnel_grace: TUNNEL_GRACE,
        }
    }

    /// Path checked by `status` for a user config file.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = path.into();
        self
    }

    /// Directory holding named sessions.
    pub fn with_session_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.session_root = root.into();
        self
    }

    /// Directory in which ephemeral session directories are created.
    pub fn with_ephemeral_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.ephemeral_root = root.into();
        self
    }

    /// Time given to the container's sshd before the tunnel is opened.
    pub fn with_tunnel_grace(mut self, grace: Duration) -> Self {
        self.tunnel_grace = grace;
        self
    }

    /// The command gateway.
    pub fn gateway(&self) -> &Gateway<'a> {
        &self.gateway
    }

    /// The session store.
    pub fn store(&self) -> &SessionStore<'a> {
        &self.store
    }

    fn reporter(&self) -> &'a dyn Reporter {
        self.gateway.reporter()
    }

    fn dry_run(&self) -> bool {
        self.gateway.context().dry_run
    }

    fn persist(&self, session: &Session) -> Result<()> {
        if self.dry_run() {
            debug!("Dry run, not saving session {}", session.name);
            return Ok(());
        }
        self.store.save(session)
    }

    /// Create a session for `cwd` and print the path of its activate script.
    pub fn init(&self, opts: InitOptions, cwd: &Path) -> Result<i32> {
        let (name, session_dir) = match opts.name {
            Some(name) => {
                if !is_plain_name(&name) {
                    return Err(Error::Config(format!("invalid session name '{name}'")));
                }
                let dir = self.session_root.join(&name);
                if is_non_empty_dir(&dir) {
                    return Err(Error::SessionExists(dir));
                }
                (name, dir)
            }
            None => {
                let dir = tempfile::Builder::new()
                    .prefix("dockerdo-")
                    .keep(true)
                    .tempdir_in(&self.ephemeral_root)?;
                (EPHEMERAL_SESSION_NAME.to_string(), dir.path().to_path_buf())
            }
        };

        let remote_host = if opts.local {
            None
        } else {
            opts.remote.or_else(|| self.config.default_remote_host.clone())
        };

        let session = Session::new(SessionOptions {
            name,
            container_name: opts.container.unwrap_or_else(ephemeral_container_name),
            remote_host,
            container_username: opts.user.unwrap_or_else(|| "root".to_string()),
            base_image: opts
                .image
                .unwrap_or_else(|| self.config.default_image.clone()),
            docker_registry: opts
                .registry
                .or_else(|| self.config.default_docker_registry.clone()),
            docker_run_args: self.config.default_docker_run_args.clone(),
            session_dir,
            remote_host_build_dir: opts.build_dir.unwrap_or_else(|| PathBuf::from(".")),
            local_work_dir: cwd.to_path_buf(),
            record_inotify: opts.record || self.config.record_inotify,
        });

        self.store.save(&session)?;
        let activate = self.store.write_activate_script(&session)?;
        info!(
            "Initialized session {} in {}",
            session.name,
            session.session_dir.display()
        );
        self.reporter().action(
            "local",
            "Initialized",
            &format!("session {} (container {})", session.name, session.container_name),
        );
        self.reporter().output(&activate.to_string_lossy());
        Ok(0)
    }

    /// Build the session image and remember its tag.
    pub fn build(&self, session: &mut Session, opts: BuildOptions) -> Result<i32> {
        let dockerfile = opts
            .file
            .unwrap_or_else(|| session.local_work_dir.join(DOCKERFILE_NAME));
        if !dockerfile.is_file() {
            return Err(Error::MissingDockerfile(dockerfile));
        }
        let ssh_key = self.read_ssh_key()?;
        let tag = make_image_tag(
            session.docker_registry.as_deref(),
            &session.base_image,
            &session.name,
        );
        let build_arg = format!("SSH_PUB_KEY={ssh_key}");

        let (scope, code) = if opts.remote {
            // The remote build runs in the build directory, so a Dockerfile
            // outside the remote mount point is looked up there by name.
            let remote_file = remote_work_dir(session, &dockerfile).unwrap_or_else(|| {
                dockerfile
                    .file_name()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DOCKERFILE_NAME))
            });
            let args = build_args(&tag, &build_arg, &remote_file);
            ("remote", self.gateway.run_remote(&join_args(&args)?, session)?)
        } else {
            let args = build_args(&tag, &build_arg, &dockerfile);
            let invocation = Invocation::from_argv(&args)?.cwd(&session.local_work_dir);
            ("local", self.gateway.execute(&invocation)?)
        };
        if code != 0 {
            self.reporter()
                .error(&format!("docker build failed with exit code {code}"));
            return Ok(code);
        }

        self.reporter()
            .action(scope, "Built", &format!("image {tag}"));
        session.image_tag = Some(tag);
        self.persist(session)?;
        Ok(0)
    }

    fn read_ssh_key(&self) -> Result<String> {
        let path = &self.config.ssh_key_path;
        let key = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read SSH public key {}: {e}", path.display()))
        })?;
        Ok(key.trim().to_string())
    }

    /// Start the container, open the SSH tunnel and mount the container
    /// filesystem.
    pub fn run(&self, session: &mut Session, opts: RunOptions) -> Result<i32> {
        let Some(tag) = session.image_tag.clone() else {
            return Err(Error::ImageNotBuilt);
        };
        if session.is_running() {
            return Err(Error::ContainerAlreadyRunning);
        }
        let port = opts.ssh_port.unwrap_or(DEFAULT_SSH_PORT);

        let mut args: Vec<String> = vec!["docker".into(), "run".into(), "-d".into()];
        if !opts.no_default_args {
            if let Some(defaults) = &session.docker_run_args {
                args.extend(split_args(defaults)?);
            }
        }
        args.extend(opts.docker_run_args.iter().cloned());
        if !session.env.is_empty() {
            if session.remote_host.is_some() {
                // env.list lives on the local host; pass the values inline.
                for (key, value) in &session.env {
                    args.push("-e".into());
                    args.push(format!("{key}={value}"));
                }
            } else {
                if !self.dry_run() {
                    self.store.write_env_list(session)?;
                }
                args.push("--env-file".into());
                args.push(session.env_list_path().to_string_lossy().into_owned());
            }
        }
        args.extend([
            "-p".into(),
            format!("{port}:22"),
            "--name".into(),
            session.container_name.clone(),
            tag,
        ]);

        let code = self.gateway.run_on_host(&args, session)?;
        if code != 0 {
            self.reporter()
                .error(&format!("docker run failed with exit code {code}"));
            return Ok(code);
        }
        session.ssh_port_on_remote_host = Some(port);
        session.container_state = ContainerState::Running;
        self.persist(session)?;
        info!("Container {} started", session.container_name);
        self.reporter()
            .action("container", "Started", &session.container_name);

        if !self.dry_run() {
            thread::sleep(self.tunnel_grace);
        }
        let host = session.ssh_host().to_string();
        let tunnel = open_tunnel(&self.gateway, session, &host, port)?;
        session.ssh_master_pid = tunnel.id();
        self.persist(session)?;

        self.mount_container(session, &host, port)?;

        ForegroundTask::choose(session, tunnel, opts.detach).run(self.reporter())
    }

    fn mount_container(&self, session: &Session, host: &str, port: u16) -> Result<()> {
        let mount_point = session.sshfs_container_mount_point();
        if !self.dry_run() {
            fs::create_dir_all(&mount_point)?;
        }
        let port = port.to_string();
        let source = format!("{}@{}:/", session.container_username, host);
        let mount_arg = mount_point.to_string_lossy().into_owned();
        let invocation = Invocation::from_argv(&[
            "sshfs",
            "-p",
            port.as_str(),
            source.as_str(),
            mount_arg.as_str(),
        ])?
        .cwd(&session.local_work_dir);

        let code = self.gateway.execute(&invocation)?;
        if code == 0 {
            self.reporter().action(
                "local",
                "Mounted",
                &format!("container filesystem at {}", mount_point.display()),
            );
        } else {
            self.reporter().warning(&format!(
                "Failed to mount container filesystem at {} (exit code {code})",
                mount_point.display()
            ));
        }
        Ok(())
    }

    /// Set a container environment variable from `KEY=VALUE`.
    pub fn export(&self, session: &mut Session, key_value: &str) -> Result<i32> {
        let (key, value) = parse_key_value(key_value)?;
        session.export(key.as_str(), value.as_str());
        if !self.dry_run() {
            self.store.write_env_list(session)?;
        }
        self.persist(session)?;
        self.reporter()
            .action("container", "Exported", &format!("{key}={value}"));
        Ok(0)
    }

    /// Run `args` inside the container, in the directory matching `cwd`.
    pub fn exec(&self, session: &Session, args: &[String], cwd: &Path) -> Result<i32> {
        if args.is_empty() {
            return Err(Error::InvalidCommand("no command given".to_string()));
        }
        let command = join_args(args)?;
        let (code, workdir) = self.gateway.run_container(&command, session, cwd)?;
        debug!("{} exited with {} in {}", command, code, workdir.display());
        if !self.dry_run() {
            self.store.append_history(session, &command)?;
        }
        Ok(code)
    }

    /// Report on the user config, image, container, mounts and tunnel.
    pub fn status(&self, session: &mut Session) -> Result<i32> {
        let reporter = self.reporter();
        self.report_user_config();

        let dockerfile = session.local_work_dir.join(DOCKERFILE_NAME);
        if dockerfile.exists() {
            reporter.info(&format!("Dockerfile found in {}", dockerfile.display()));
        } else {
            reporter.warning(&format!("No Dockerfile found in {}", dockerfile.display()));
        }

        if let Some(tag) = session.image_tag.clone() {
            reporter.info(&format!("Docker images with tag: {tag}"));
            self.gateway
                .run_on_host(&["docker", "images", tag.as_str()], session)?;
        }

        let cached = session.container_state;
        let running = verify_container_state(session, &self.gateway);
        if session.container_state != cached {
            self.persist(session)?;
        }
        if running {
            reporter.info(&format!("Containers named {}", session.container_name));
            let filter = format!("name={}", session.container_name);
            self.gateway
                .run_on_host(&["docker", "ps", "-a", "--filter", filter.as_str()], session)?;
        }

        if let Some(mount_point) = session.sshfs_remote_mount_point() {
            if is_mount_point(&mount_point) {
                reporter.info(&format!(
                    "Remote host build directory mounted at {}",
                    mount_point.display()
                ));
            } else {
                reporter.warning(&format!(
                    "Remote host build directory not mounted at {}",
                    mount_point.display()
                ));
            }
        }
        if running {
            let mount_point = session.sshfs_container_mount_point();
            if is_mount_point(&mount_point) {
                reporter.info(&format!(
                    "Container filesystem mounted at {}",
                    mount_point.display()
                ));
            } else {
                reporter.warning(&format!(
                    "Container filesystem not mounted at {}",
                    mount_point.display()
                ));
            }

            let socket = session.ssh_socket();
            if socket.exists() {
                reporter.info(&format!("SSH socket found at {}", socket.display()));
            } else {
                reporter.warning(&format!("SSH socket not found at {}", socket.display()));
            }
        }

        reporter.container_status(session.container_state);
        reporter.info("Session status:");
        reporter.info(&session.to_yaml_excluding(&["modified_files", "container_state"])?);
        Ok(0)
    }

    /// `status` when no session is active.
    pub fn status_without_session(&self) -> Result<i32> {
        self.report_user_config();
        self.reporter().info("No active session");
        Ok(0)
    }

    fn report_user_config(&self) {
        if !self.config_path.exists() {
            self.reporter().warning(&format!(
                "No user config found in {}",
                self.config_path.display()
            ));
        }
    }

    /// Stop the container and tear down the SSH tunnel.
    pub fn stop(&self, session: &mut Session) -> Result<i32> {
        let name = session.container_name.clone();
        let code = self
            .gateway
            .run_on_host(&["docker", "stop", name.as_str()], session)?;
        close_tunnel(&self.gateway, session);
        if code == 0 {
            session.container_state = ContainerState::Stopped;
            self.reporter().action("container", "Stopped", &name);
        } else {
            self.reporter()
                .error(&format!("docker stop failed with exit code {code}"));
        }
        self.persist(session)?;
        Ok(code)
    }

    /// Print the modified files (when recorded) and the command history.
    pub fn history(&self, session: &Session) -> Result<i32> {
        let reporter = self.reporter();
        if session.record_inotify {
            reporter.info("Modified files:");
            for file in &session.modified_files {
                reporter.output(&file.to_string_lossy());
            }
        } else {
            reporter.info("Recording of modified files is disabled");
        }
        reporter.info("Command history:");
        reporter.output(self.store.read_history(session)?.trim_end());
        Ok(0)
    }

    /// Remove the container.
    pub fn rm(&self, session: &mut Session) -> Result<i32> {
        let name = session.container_name.clone();
        let code = self
            .gateway
            .run_on_host(&["docker", "rm", name.as_str()], session)?;
        if code != 0 {
            self.reporter()
                .error(&format!("docker rm failed with exit code {code}"));
            return Ok(code);
        }
        close_tunnel(&self.gateway, session);
        session.container_state = ContainerState::Nothing;
        self.persist(session)?;
        self.reporter().action("container", "Removed", &name);
        Ok(0)
    }
}

fn build_args(tag: &str, build_arg: &str, dockerfile: &Path) -> Vec<String> {
    vec![
        "docker".to_string(),
        "build".to_string(),
        "-t".to_string(),
        tag.to_string(),
        "--build-arg".to_string(),
        build_arg.to_string(),
        "-f".to_string(),
        dockerfile.to_string_lossy().into_owned(),
        ".".to_string(),
    ]
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/')
}

fn is_non_empty_dir(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

#[cfg(unix)]
fn is_mount_point(path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    let Some(parent) = path.parent() else {
        return false;
    };
    match (fs::metadata(path), fs::metadata(parent)) {
        (Ok(meta), Ok(parent_meta)) => meta.dev() != parent_meta.dev(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn is_mount_point(_path: &Path) -> bool {
    false
}
