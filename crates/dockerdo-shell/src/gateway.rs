//! Command gateway: runs commands against the local host, the remote host or
//! the container, honouring the execution context.

use std::path::{Path, PathBuf};

use tracing::{debug, error};

use dockerdo_core::{container_work_dir, Error, Reporter, Result, Session};

use crate::command::{join_args, CommandBuilder, Invocation};
use crate::context::ExecutionContext;
use crate::runner::{BackgroundProcess, CommandOutput, CommandRunner};

/// Executes commands for one CLI invocation.
pub struct Gateway<'a> {
    ctx: ExecutionContext,
    runner: &'a dyn CommandRunner,
    reporter: &'a dyn Reporter,
}

impl<'a> Gateway<'a> {
    /// Create a gateway.
    pub fn new(
        ctx: ExecutionContext,
        runner: &'a dyn CommandRunner,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            ctx,
            runner,
            reporter,
        }
    }

    /// The execution context.
    pub fn context(&self) -> ExecutionContext {
        self.ctx
    }

    /// The output sink.
    pub fn reporter(&self) -> &'a dyn Reporter {
        self.reporter
    }

    fn echo(&self, line: &str) {
        if self.ctx.echoes() {
            self.reporter.command(line);
        }
    }

    fn launch_error(&self, program: &str, source: std::io::Error) -> Error {
        error!("Failed to launch {}: {}", program, source);
        Error::launch(program, source)
    }

    /// Run an invocation to completion and return its exit code.
    pub fn execute(&self, invocation: &Invocation) -> Result<i32> {
        self.echo(&invocation.command_line());
        if self.ctx.dry_run {
            debug!("Dry run, skipping: {}", invocation);
            return Ok(0);
        }
        let code = self
            .runner
            .run(invocation)
            .map_err(|e| self.launch_error(&invocation.program, e))?;
        debug!("{} exited with {}", invocation.program, code);
        Ok(code)
    }

    /// Run an invocation and capture its stdout.
    ///
    /// Returns `None` in dry-run mode.
    pub fn capture(&self, invocation: &Invocation) -> Result<Option<CommandOutput>> {
        self.echo(&invocation.command_line());
        if self.ctx.dry_run {
            return Ok(None);
        }
        let output = self
            .runner
            .output(invocation)
            .map_err(|e| self.launch_error(&invocation.program, e))?;
        Ok(Some(output))
    }

    /// Start an invocation in the background.
    ///
    /// Returns a detached handle in dry-run mode.
    pub fn spawn(&self, invocation: &Invocation) -> Result<BackgroundProcess> {
        self.echo(&invocation.command_line());
        if self.ctx.dry_run {
            return Ok(BackgroundProcess::detached(&invocation.program));
        }
        self.runner
            .spawn(invocation)
            .map_err(|e| self.launch_error(&invocation.program, e))
    }

    /// Run a command line on the local host in `cwd`, inheriting stdio.
    pub fn run_local(&self, command: &str, cwd: &Path) -> Result<i32> {
        if self.ctx.dry_run {
            // Nothing is parsed in a dry run, so any command line "succeeds".
            self.echo(command);
            return Ok(0);
        }
        let invocation = Invocation::from_command_line(command)?.cwd(cwd);
        self.execute(&invocation)
    }

    /// Run a command line on the remote host, in its build directory.
    pub fn run_remote(&self, command: &str, session: &Session) -> Result<i32> {
        let invocation = CommandBuilder::remote(command).build(session)?;
        self.execute(&invocation)
    }

    /// Run a command line inside the container, in the directory matching `cwd`.
    ///
    /// Fails with [`Error::NotInMount`] without running anything if `cwd` is
    /// outside the container mount point. Returns the exit code and the
    /// container directory the command ran in.
    pub fn run_container(
        &self,
        command: &str,
        session: &Session,
        cwd: &Path,
    ) -> Result<(i32, PathBuf)> {
        let workdir = container_work_dir(session, cwd).ok_or_else(|| Error::NotInMount {
            cwd: cwd.to_path_buf(),
            mount_point: session.sshfs_container_mount_point(),
        })?;
        let invocation = CommandBuilder::container(command, &workdir)
            .envs(session.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .build(session)?;
        let code = self.execute(&invocation)?;
        Ok((code, workdir))
    }

    /// Invocation of `args` on the docker host: local when the session has
    /// no remote host, the remote host otherwise.
    pub fn host_invocation<S: AsRef<str>>(
        &self,
        args: &[S],
        session: &Session,
    ) -> Result<Invocation> {
        match session.remote_host {
            None => Ok(Invocation::from_argv(args)?.cwd(&session.local_work_dir)),
            Some(_) => CommandBuilder::remote(join_args(args)?).build(session),
        }
    }

    /// Run `args` on the docker host.
    pub fn run_on_host<S: AsRef<str>>(&self, args: &[S], session: &Session) -> Result<i32> {
        let invocation = self.host_invocation(args, session)?;
        self.execute(&invocation)
    }

    /// Run `args` on the docker host and capture stdout; `None` in dry-run mode.
    pub fn output_on_host<S: AsRef<str>>(
        &self,
        args: &[S],
        session: &Session,
    ) -> Result<Option<CommandOutput>> {
        let invocation = self.host_invocation(args, session)?;
        self.capture(&invocation)
    }
}
