//! Session persistence.
//!
//! A session lives in its own directory: `session.yaml` is the record, and
//! `activate`, `command_history` and `env.list` sit next to it. There is no
//! locking; the last writer wins.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use dockerdo_core::{Error, Reporter, Result, Session};
use dockerdo_shell::join_args;

/// Reads and writes session records and their side files.
pub struct SessionStore<'a> {
    reporter: &'a dyn Reporter,
}

impl<'a> SessionStore<'a> {
    /// Create a store reporting directory creation to `reporter`.
    pub fn new(reporter: &'a dyn Reporter) -> Self {
        Self { reporter }
    }

    /// Load the session stored in `session_dir`.
    pub fn load(&self, session_dir: &Path) -> Result<Session> {
        let path = session_dir.join(Session::RECORD_FILE);
        if !path.is_file() {
            return Err(Error::SessionNotFound(session_dir.to_path_buf()));
        }
        let yaml = fs::read_to_string(&path)?;
        let session: Session =
            serde_yaml::from_str(&yaml).map_err(|e| Error::CorruptSession {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        debug!("Loaded session {} from {}", session.name, path.display());
        Ok(session)
    }

    /// Write the full record, creating the session directory on first save.
    ///
    /// The record is written to a temporary file and renamed over the old
    /// one, so readers never see a half-written record.
    pub fn save(&self, session: &Session) -> Result<()> {
        let dir = &session.session_dir;
        if !dir.exists() {
            fs::create_dir_all(dir)?;
            self.reporter
                .action("local", "Created", &format!("session directory {}", dir.display()));
        }
        let yaml = serde_yaml::to_string(session)?;
        let path = session.record_path();
        let tmp = dir.join(format!("{}.tmp", Session::RECORD_FILE));
        fs::write(&tmp, yaml)?;
        fs::rename(&tmp, &path)?;
        info!(
            "Saved session {} (state: {}) to {}",
            session.name,
            session.container_state,
            path.display()
        );
        Ok(())
    }

    /// Write the `activate` script and return its path.
    pub fn write_activate_script(&self, session: &Session) -> Result<PathBuf> {
        let path = session.activate_script();
        fs::write(&path, activate_script(session)?)?;
        debug!("Wrote activate script {}", path.display());
        Ok(path)
    }

    /// Append one command to the history file.
    pub fn append_history(&self, session: &Session, command: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(session.command_history_path())?;
        writeln!(file, "{command}")?;
        Ok(())
    }

    /// Contents of the history file; empty when nothing was run yet.
    pub fn read_history(&self, session: &Session) -> Result<String> {
        match fs::read_to_string(session.command_history_path()) {
            Ok(history) => Ok(history),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Rewrite `env.list` from the session env.
    pub fn write_env_list(&self, session: &Session) -> Result<()> {
        fs::write(session.env_list_path(), session.format_env_list())?;
        Ok(())
    }
}

fn activate_script(session: &Session) -> Result<String> {
    let dir = session.session_dir.to_string_lossy();
    let dir_var = format!("DOCKERDO_SESSION_DIR={dir}");
    let name_var = format!("DOCKERDO_SESSION_NAME={}", session.name);
    let mut lines = vec![
        join_args(&["export", dir_var.as_str()])?,
        join_args(&["export", name_var.as_str()])?,
    ];
    if let (Some(host), Some(mount_point)) =
        (&session.remote_host, session.sshfs_remote_mount_point())
    {
        let mount_point = mount_point.to_string_lossy().into_owned();
        let source = format!("{host}:{}", session.remote_host_build_dir.display());
        lines.push(join_args(&["mkdir", "-p", mount_point.as_str()])?);
        lines.push(join_args(&["sshfs", source.as_str(), mount_point.as_str()])?);
    }
    let mut script = lines.join("\n");
    script.push('\n');
    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockerdo_core::{ContainerState, MemoryReporter, SessionOptions};

    fn session(dir: &Path, remote_host: Option<&str>) -> Session {
        Session::new(SessionOptions {
            name: "test".to_string(),
            container_name: "box".to_string(),
            remote_host: remote_host.map(str::to_string),
            container_username: "root".to_string(),
            base_image: "ubuntu:latest".to_string(),
            docker_registry: None,
            docker_run_args: None,
            session_dir: dir.to_path_buf(),
            remote_host_build_dir: PathBuf::from("/srv/build"),
            local_work_dir: PathBuf::from("/home/me/work"),
            record_inotify: false,
        })
    }

    #[test]
    fn test_save_creates_dir_and_reports() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("s");
        let reporter = MemoryReporter::new();
        let store = SessionStore::new(&reporter);

        store.save(&session(&dir, None)).unwrap();
        assert!(dir.join("session.yaml").is_file());
        assert!(!dir.join("session.yaml.tmp").exists());
        assert_eq!(reporter.reports().len(), 1);

        store.save(&session(&dir, None)).unwrap();
        assert_eq!(reporter.reports().len(), 1);
    }

    #[test]
    fn test_save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let reporter = MemoryReporter::new();
        let store = SessionStore::new(&reporter);
        let mut s = session(tmp.path(), Some("gpu01"));
        s.container_state = ContainerState::Stopped;
        s.export("FOO", "bar");
        s.ssh_master_pid = Some(4242);

        store.save(&s).unwrap();
        assert_eq!(store.load(tmp.path()).unwrap(), s);
    }

    #[test]
    fn test_load_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let reporter = MemoryReporter::new();
        let store = SessionStore::new(&reporter);
        assert!(matches!(
            store.load(tmp.path()),
            Err(Error::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_load_corrupt() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("session.yaml"), "name: [unclosed").unwrap();
        let reporter = MemoryReporter::new();
        let store = SessionStore::new(&reporter);
        assert!(matches!(
            store.load(tmp.path()),
            Err(Error::CorruptSession { .. })
        ));
    }

    #[test]
    fn test_activate_script_local() {
        let s = session(Path::new("/tmp/my session"), None);
        let script = activate_script(&s).unwrap();
        assert_eq!(
            script,
            "export 'DOCKERDO_SESSION_DIR=/tmp/my session'\nexport 'DOCKERDO_SESSION_NAME=test'\n"
        );
    }

    #[test]
    fn test_activate_script_mounts_remote() {
        let s = session(Path::new("/tmp/s"), Some("gpu01"));
        let script = activate_script(&s).unwrap();
        assert!(script.contains("mkdir -p /home/me/work/gpu01\n"));
        assert!(script.contains("sshfs gpu01:/srv/build /home/me/work/gpu01\n"));
    }

    #[test]
    fn test_history_append_and_read() {
        let tmp = tempfile::tempdir().unwrap();
        let reporter = MemoryReporter::new();
        let store = SessionStore::new(&reporter);
        let s = session(tmp.path(), None);

        assert_eq!(store.read_history(&s).unwrap(), "");
        store.append_history(&s, "make").unwrap();
        store.append_history(&s, "make test").unwrap();
        assert_eq!(store.read_history(&s).unwrap(), "make\nmake test\n");
    }

    #[test]
    fn test_env_list_is_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        let reporter = MemoryReporter::new();
        let store = SessionStore::new(&reporter);
        let mut s = session(tmp.path(), None);
        s.export("ZED", "1");
        s.export("ALPHA", "2");

        store.write_env_list(&s).unwrap();
        let list = fs::read_to_string(s.env_list_path()).unwrap();
        assert_eq!(list, "ALPHA=2\nZED=1\n");
    }
}
