//! Typed command construction.
//!
//! Every command ends up as an [`Invocation`]: a program and an argument
//! vector executed without a local shell. For the remote host and the
//! container the user command becomes a single `sh -c` token inside the SSH
//! remote script, so it is quoted exactly once no matter what it contains.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use dockerdo_core::{Error, Result, Session};

/// A fully constructed subprocess invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program to execute
    pub program: String,
    /// Arguments, not including the program
    pub args: Vec<String>,
    /// Working directory; inherited when `None`
    pub cwd: Option<PathBuf>,
    /// Extra environment variables
    pub env: Vec<(String, String)>,
}

impl Invocation {
    /// Create an invocation of `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
        }
    }

    /// Build an invocation from an argument vector (`argv[0]` is the program).
    pub fn from_argv<S: AsRef<str>>(argv: &[S]) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::InvalidCommand("empty command".to_string()))?;
        Ok(Self::new(program.as_ref()).args(args.iter().map(|a| a.as_ref())))
    }

    /// Split a command line with POSIX shell rules, without running a shell.
    pub fn from_command_line(command: &str) -> Result<Self> {
        Self::from_argv(&split_args(command)?)
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Program followed by its arguments.
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }

    /// Shell-quoted rendering, for echoing and logs only.
    pub fn command_line(&self) -> String {
        let argv = self.argv();
        shlex::try_join(argv.iter().copied()).unwrap_or_else(|_| argv.join(" "))
    }
}

impl std::fmt::Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Join an argument vector into a single shell command line.
pub fn join_args<S: AsRef<str>>(args: &[S]) -> Result<String> {
    shlex::try_join(args.iter().map(|a| a.as_ref()))
        .map_err(|e| Error::InvalidCommand(e.to_string()))
}

/// Split a command line into words with POSIX shell rules.
pub fn split_args(line: &str) -> Result<Vec<String>> {
    shlex::split(line)
        .ok_or_else(|| Error::InvalidCommand(format!("unbalanced quotes in: {line}")))
}

fn quote(s: &str) -> Result<String> {
    shlex::try_quote(s)
        .map(|quoted| quoted.into_owned())
        .map_err(|e| Error::InvalidCommand(e.to_string()))
}

/// Where a command runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Directly on the local host, in `cwd`
    Local {
        /// Working directory
        cwd: PathBuf,
    },
    /// On the remote host, in the session's remote build directory
    RemoteHost,
    /// Inside the container, in `workdir`
    Container {
        /// Working directory inside the container
        workdir: PathBuf,
    },
}

/// Builder turning a user command into an [`Invocation`] for a [`Target`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBuilder {
    target: Target,
    command: String,
    env: BTreeMap<String, String>,
}

impl CommandBuilder {
    /// Run `command` on the local host.
    pub fn local(command: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self::with_target(Target::Local { cwd: cwd.into() }, command)
    }

    /// Run `command` on the remote host.
    pub fn remote(command: impl Into<String>) -> Self {
        Self::with_target(Target::RemoteHost, command)
    }

    /// Run `command` inside the container.
    pub fn container(command: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        Self::with_target(
            Target::Container {
                workdir: workdir.into(),
            },
            command,
        )
    }

    fn with_target(target: Target, command: impl Into<String>) -> Self {
        Self {
            target,
            command: command.into(),
            env: BTreeMap::new(),
        }
    }

    /// Override an environment variable for the command.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Override several environment variables.
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// The execution target.
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Produce the invocation for this command against `session`.
    pub fn build(&self, session: &Session) -> Result<Invocation> {
        let invocation = match &self.target {
            Target::Local { cwd } => {
                let mut invocation = Invocation::from_command_line(&self.command)?.cwd(cwd);
                invocation.env = self
                    .env
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                invocation
            }
            Target::RemoteHost => {
                let remote_host = session.remote_host.as_deref().ok_or(Error::NoRemoteHost)?;
                let script = self.remote_script(&session.remote_host_build_dir)?;
                Invocation::new("ssh")
                    .arg("-S")
                    .arg(session.ssh_socket().to_string_lossy())
                    .arg(remote_host)
                    .arg(script)
            }
            Target::Container { workdir } => {
                let port = session
                    .ssh_port_on_remote_host
                    .ok_or(Error::ContainerNotStarted)?;
                let mut invocation = Invocation::new("ssh")
                    .arg("-S")
                    .arg(session.ssh_socket().to_string_lossy());
                if let Some(remote_host) = &session.remote_host {
                    invocation = invocation.arg("-J").arg(remote_host);
                }
                invocation
                    .arg("-p")
                    .arg(port.to_string())
                    .arg("-o")
                    .arg("StrictHostKeyChecking=no")
                    .arg(format!(
                        "{}@{}",
                        session.container_username,
                        session.ssh_host()
                    ))
                    .arg(self.remote_script(workdir)?)
            }
        };
        debug!("Built {:?} invocation: {}", self.target, invocation);
        Ok(invocation)
    }

    /// `cd <dir> && [env K=V ...] sh -c <command>`
    fn remote_script(&self, dir: &Path) -> Result<String> {
        let mut script = format!("cd {} && ", quote(&dir.to_string_lossy())?);
        if !self.env.is_empty() {
            script.push_str("env ");
            for (key, value) in &self.env {
                script.push_str(&quote(&format!("{key}={value}"))?);
                script.push(' ');
            }
        }
        script.push_str("sh -c ");
        script.push_str(&quote(&self.command)?);
        Ok(script)
    }
}
