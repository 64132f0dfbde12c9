//! SSH master process keeping the session control socket alive.

use std::path::Path;

use tracing::{debug, info, warn};

use dockerdo_core::{Error, Reporter, Result, Session};

use crate::command::Invocation;
use crate::gateway::Gateway;
use crate::runner::BackgroundProcess;

/// `ssh -M -N -S <sock> -p <port> -o StrictHostKeyChecking=no <user>@<host>`
pub fn master_invocation(session: &Session, host: &str, port: u16) -> Invocation {
    Invocation::new("ssh")
        .arg("-M")
        .arg("-N")
        .arg("-S")
        .arg(session.ssh_socket().to_string_lossy())
        .arg("-p")
        .arg(port.to_string())
        .arg("-o")
        .arg("StrictHostKeyChecking=no")
        .arg(format!("{}@{}", session.container_username, host))
        .cwd(&session.local_work_dir)
}

/// Start the SSH master in the background.
pub fn open_tunnel(
    gateway: &Gateway<'_>,
    session: &Session,
    host: &str,
    port: u16,
) -> Result<BackgroundProcess> {
    let process = gateway.spawn(&master_invocation(session, host, port))?;
    if let Some(pid) = process.id() {
        info!("SSH master started for {}: pid={}", session.name, pid);
    }
    Ok(process)
}

/// Tear down the SSH master of `session`.
///
/// Best-effort and idempotent: asks the master to exit over the control
/// socket, falls back to SIGTERM on the recorded pid, removes a leftover
/// socket file and forgets the pid. The pid is only signalled while it
/// still runs this session's SSH master, since it may have been reused.
/// The caller persists the session.
pub fn close_tunnel(gateway: &Gateway<'_>, session: &mut Session) {
    let socket = session.ssh_socket();
    let dry_run = gateway.context().dry_run;

    let mut exited = false;
    if socket.exists() {
        let exit = Invocation::new("ssh")
            .arg("-S")
            .arg(socket.to_string_lossy())
            .arg("-O")
            .arg("exit")
            .arg(session.ssh_host())
            .cwd(&session.local_work_dir);
        match gateway.execute(&exit) {
            Ok(0) => exited = true,
            Ok(code) => debug!("ssh -O exit returned {}", code),
            Err(e) => warn!("Could not ask SSH master to exit: {}", e),
        }
    }

    if !exited && !dry_run {
        if let Some(pid) = session.ssh_master_pid {
            if !is_master_process(pid, &socket) {
                debug!(
                    "pid {} is not the SSH master of {}, not signalling",
                    pid, session.name
                );
            } else if kill_process(pid) {
                info!("Sent SIGTERM to SSH master: pid={}", pid);
            } else {
                debug!("SSH master already gone: pid={}", pid);
            }
        }
    }

    if !dry_run && socket.exists() {
        if let Err(e) = std::fs::remove_file(&socket) {
            warn!("Failed to remove control socket {}: {}", socket.display(), e);
        }
    }

    session.ssh_master_pid = None;
}

/// Whether `argv` is an SSH master serving `socket`.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn is_master_command<S: AsRef<str>>(argv: &[S], socket: &Path) -> bool {
    let Some(program) = argv.first() else {
        return false;
    };
    let socket = socket.to_string_lossy();
    Path::new(program.as_ref()).file_name().is_some_and(|name| name == "ssh")
        && argv.iter().any(|arg| arg.as_ref() == "-M")
        && argv
            .windows(2)
            .any(|pair| pair[0].as_ref() == "-S" && pair[1].as_ref() == socket)
}

#[cfg(target_os = "linux")]
fn is_master_process(pid: u32, socket: &Path) -> bool {
    let Ok(raw) = std::fs::read(format!("/proc/{pid}/cmdline")) else {
        return false;
    };
    let argv: Vec<String> = raw
        .split(|b| *b == 0)
        .filter(|arg| !arg.is_empty())
        .map(|arg| String::from_utf8_lossy(arg).into_owned())
        .collect();
    is_master_command(&argv, socket)
}

// No portable way to read another process's argv; never signal blindly.
#[cfg(not(target_os = "linux"))]
fn is_master_process(_pid: u32, _socket: &Path) -> bool {
    false
}

#[cfg(unix)]
fn kill_process(pid: u32) -> bool {
    // SAFETY: kill(2) takes plain integers and touches no memory of ours.
    unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) == 0 }
}

#[cfg(windows)]
fn kill_process(pid: u32) -> bool {
    use std::process::Command;
    Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F"])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// The single task occupying the foreground at the end of `run`.
#[derive(Debug)]
pub enum ForegroundTask {
    /// Block on the SSH master until it exits
    KeepTunnel(BackgroundProcess),
    /// Filesystem event recording; unsupported, the tunnel stays in the background
    RecordEvents(BackgroundProcess),
    /// Leave the SSH master running and return
    Detached(BackgroundProcess),
}

impl ForegroundTask {
    /// Pick the foreground task for a freshly started tunnel.
    pub fn choose(session: &Session, tunnel: BackgroundProcess, detach: bool) -> Self {
        if detach {
            Self::Detached(tunnel)
        } else if session.record_inotify {
            Self::RecordEvents(tunnel)
        } else {
            Self::KeepTunnel(tunnel)
        }
    }

    /// The tunnel handle owned by this task.
    pub fn tunnel(&self) -> &BackgroundProcess {
        match self {
            Self::KeepTunnel(p) | Self::RecordEvents(p) | Self::Detached(p) => p,
        }
    }

    /// Run the task. Returns the exit code for `run`.
    pub fn run(self, reporter: &dyn Reporter) -> Result<i32> {
        match self {
            Self::KeepTunnel(tunnel) => {
                if tunnel.is_detached() {
                    return Ok(0);
                }
                reporter.info("Keeping the SSH tunnel open, press Ctrl-C to close it");
                let program = tunnel.program().to_string();
                let code = tunnel.wait().map_err(|e| Error::launch(program, e))?;
                info!("SSH master exited with {}", code);
                Ok(0)
            }
            Self::RecordEvents(tunnel) => {
                reporter.warning(&format!(
                    "Recording filesystem events is not supported, SSH tunnel left in the background{}",
                    pid_suffix(&tunnel)
                ));
                Ok(0)
            }
            Self::Detached(tunnel) => {
                reporter.info(&format!(
                    "SSH tunnel running in the background{}",
                    pid_suffix(&tunnel)
                ));
                Ok(0)
            }
        }
    }
}

fn pid_suffix(process: &BackgroundProcess) -> String {
    process
        .id()
        .map(|pid| format!(" (pid {pid})"))
        .unwrap_or_default()
}
