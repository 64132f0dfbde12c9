//! Subprocess execution.

use std::io;
use std::process::{Child, Command, ExitStatus, Stdio};

use tracing::{debug, info};

use crate::command::Invocation;

/// Captured result of a command run for its output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// Exit code
    pub code: i32,
    /// Everything written to stdout
    pub stdout: Vec<u8>,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    pub fn success(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            code: 0,
            stdout: stdout.into(),
        }
    }

    /// Whether the command exited with code 0.
    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// Stdout decoded lossily.
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Handle to a process left running in the background.
#[derive(Debug)]
pub struct BackgroundProcess {
    program: String,
    child: Option<Child>,
}

impl BackgroundProcess {
    /// Wrap a spawned child.
    pub fn spawned(program: impl Into<String>, child: Child) -> Self {
        Self {
            program: program.into(),
            child: Some(child),
        }
    }

    /// A handle with no process behind it (dry run, test doubles).
    pub fn detached(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            child: None,
        }
    }

    /// Program name.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// OS process id, if a process was spawned.
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Whether no process is behind this handle.
    pub fn is_detached(&self) -> bool {
        self.child.is_none()
    }

    /// Block until the process exits and return its exit code.
    ///
    /// A detached handle returns 0 immediately.
    pub fn wait(self) -> io::Result<i32> {
        match self.child {
            Some(mut child) => {
                info!("Waiting on background process: {} (pid {})", self.program, child.id());
                let status = child.wait()?;
                Ok(exit_code(status))
            }
            None => Ok(0),
        }
    }
}

/// Seam between command construction and the operating system.
pub trait CommandRunner {
    /// Run to completion with stdin, stdout and stderr inherited.
    fn run(&self, invocation: &Invocation) -> io::Result<i32>;

    /// Run to completion capturing stdout; stderr is inherited.
    fn output(&self, invocation: &Invocation) -> io::Result<CommandOutput>;

    /// Start without waiting.
    fn spawn(&self, invocation: &Invocation) -> io::Result<BackgroundProcess>;
}

/// Runner backed by `std::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    fn command(invocation: &Invocation) -> Command {
        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);
        if let Some(cwd) = &invocation.cwd {
            command.current_dir(cwd);
        }
        command.envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        command
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> io::Result<i32> {
        debug!("Running: {}", invocation);
        let status = Self::command(invocation)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()?;
        Ok(exit_code(status))
    }

    fn output(&self, invocation: &Invocation) -> io::Result<CommandOutput> {
        debug!("Capturing output of: {}", invocation);
        let output = Self::command(invocation)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()?;
        Ok(CommandOutput {
            code: exit_code(output.status),
            stdout: output.stdout,
        })
    }

    fn spawn(&self, invocation: &Invocation) -> io::Result<BackgroundProcess> {
        debug!("Spawning: {}", invocation);
        let child = Self::command(invocation).stdin(Stdio::null()).spawn()?;
        info!("Spawned {} (pid {})", invocation.program, child.id());
        Ok(BackgroundProcess::spawned(&invocation.program, child))
    }
}

/// Exit code of a finished process; death by signal maps to `128 + signal`.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
