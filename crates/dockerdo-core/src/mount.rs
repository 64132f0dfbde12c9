//! Translation between local paths and paths behind the sshfs mount points.
//!
//! All matching is done on path components after lexical normalization, so
//! `/work/container2` is never considered to be inside `/work/container`, and
//! trailing separators or `.`/`..` segments do not change the result.

use std::path::{Component, Path, PathBuf};

use crate::Session;

/// Resolve `.` and `..` components without touching the filesystem.
///
/// `..` at the root is dropped, matching how the kernel resolves `/..`.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Strip `base` from `path`, both normalized; `None` if `path` is outside `base`.
fn relative_to(path: &Path, base: &Path) -> Option<PathBuf> {
    let path = normalize_lexically(path);
    let base = normalize_lexically(base);
    path.strip_prefix(&base).ok().map(Path::to_path_buf)
}

/// Map a local working directory to the same directory inside the container.
///
/// Returns `None` if `cwd` is not inside the container mount point. The mount
/// point itself maps to `/`.
pub fn container_work_dir(session: &Session, cwd: &Path) -> Option<PathBuf> {
    let rel = relative_to(cwd, &session.sshfs_container_mount_point())?;
    Some(Path::new("/").join(rel))
}

/// Map a local working directory to the same directory on the remote host.
///
/// Returns `None` for local-only sessions or if `cwd` is not inside the remote
/// mount point. The mount point itself maps to the remote build directory.
pub fn remote_work_dir(session: &Session, cwd: &Path) -> Option<PathBuf> {
    let mount_point = session.sshfs_remote_mount_point()?;
    let rel = relative_to(cwd, &mount_point)?;
    if rel.as_os_str().is_empty() {
        return Some(session.remote_host_build_dir.clone());
    }
    Some(session.remote_host_build_dir.join(rel))
}
