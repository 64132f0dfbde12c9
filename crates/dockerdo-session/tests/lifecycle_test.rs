//! End-to-end session lifecycle against a scripted runner.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dockerdo_core::{ContainerState, Error, MemoryReporter, UserConfig};
use dockerdo_session::{Actions, BuildOptions, InitOptions, RunOptions};
use dockerdo_shell::testing::ScriptedRunner;
use dockerdo_shell::{split_args, CommandOutput, ExecutionContext, Gateway};

/// Config pointing at a throwaway public key.
fn config(work: &Path) -> UserConfig {
    let key = work.join("id_test.pub");
    fs::write(&key, "ssh-ed25519 AAAATEST user@host\n").unwrap();
    UserConfig {
        ssh_key_path: key,
        ..UserConfig::default()
    }
}

fn actions<'a>(
    runner: &'a ScriptedRunner,
    reporter: &'a MemoryReporter,
    config: UserConfig,
    root: &Path,
) -> Actions<'a> {
    let gateway = Gateway::new(ExecutionContext::quiet(), runner, reporter);
    Actions::new(gateway, config)
        .with_session_root(root)
        .with_ephemeral_root(root)
        .with_config_path(root.join("dockerdo.yaml"))
        .with_tunnel_grace(Duration::ZERO)
}

#[test]
fn test_full_lifecycle() {
    let work = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new();
    let reporter = MemoryReporter::new();
    let actions = actions(&runner, &reporter, config(work.path()), root.path());

    // init: ephemeral session in a temp dir
    assert_eq!(actions.init(InitOptions::default(), work.path()).unwrap(), 0);
    let activate = PathBuf::from(&reporter.outputs()[0]);
    assert!(activate.is_file());
    let session_dir = activate.parent().unwrap().to_path_buf();
    assert!(session_dir.join("session.yaml").is_file());
    assert_eq!(session_dir.parent().unwrap(), root.path());
    assert!(session_dir
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("dockerdo-"));

    let store = actions.store();
    let mut session = store.load(&session_dir).unwrap();
    assert_eq!(session.name, "ephemeral");
    assert_eq!(session.container_state, ContainerState::Nothing);
    assert_eq!(session.local_work_dir, work.path());
    assert_eq!(runner.call_count(), 0);

    // build
    fs::write(work.path().join("Dockerfile.dockerdo"), "FROM ubuntu:latest\n").unwrap();
    assert_eq!(
        actions.build(&mut session, BuildOptions::default()).unwrap(),
        0
    );
    let tag = "dockerdo-ubuntu:latest-ephemeral";
    assert_eq!(store.load(&session_dir).unwrap().image_tag.as_deref(), Some(tag));
    let calls = runner.calls();
    let build = &calls[0];
    assert_eq!(build.argv()[..4], ["docker", "build", "-t", tag]);
    assert_eq!(
        build.args[3..5],
        ["--build-arg", "SSH_PUB_KEY=ssh-ed25519 AAAATEST user@host"]
    );

    // run
    runner.clear_calls();
    let code = actions
        .run(
            &mut session,
            RunOptions {
                detach: true,
                ..RunOptions::default()
            },
        )
        .unwrap();
    assert_eq!(code, 0);
    let loaded = store.load(&session_dir).unwrap();
    assert_eq!(loaded.container_state, ContainerState::Running);
    assert_eq!(loaded.ssh_port_on_remote_host, Some(2222));
    assert_eq!(runner.calls_containing("-M").len(), 1);
    assert_eq!(runner.calls_containing("sshfs").len(), 1);

    // export
    assert_eq!(actions.export(&mut session, "FOO=bar").unwrap(), 0);
    assert_eq!(actions.export(&mut session, "ALPHA=1").unwrap(), 0);
    assert_eq!(
        fs::read_to_string(session.env_list_path()).unwrap(),
        "ALPHA=1\nFOO=bar\n"
    );
    assert_eq!(store.load(&session_dir).unwrap().env.len(), 2);

    // exec inside the container mount point
    runner.clear_calls();
    runner.push_exit_code(3);
    let cwd = work.path().join("container").join("usr");
    let args = vec!["make".to_string(), "test suite".to_string()];
    assert_eq!(actions.exec(&session, &args, &cwd).unwrap(), 3);
    let script = runner.calls()[0].args.last().unwrap().clone();
    let words = split_args(&script).unwrap();
    assert_eq!(words[..2], ["cd", "/usr"]);
    assert!(words.contains(&"FOO=bar".to_string()));
    assert_eq!(words.last().unwrap(), "make 'test suite'");
    assert_eq!(
        fs::read_to_string(session.command_history_path()).unwrap(),
        "make 'test suite'\n"
    );

    // stop
    assert_eq!(actions.stop(&mut session).unwrap(), 0);
    assert_eq!(
        store.load(&session_dir).unwrap().container_state,
        ContainerState::Stopped
    );

    // rm
    assert_eq!(actions.rm(&mut session).unwrap(), 0);
    let loaded = store.load(&session_dir).unwrap();
    assert_eq!(loaded.container_state, ContainerState::Nothing);
    assert_eq!(loaded.ssh_master_pid, None);
}

#[test]
fn test_init_named_session() {
    let work = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new();
    let reporter = MemoryReporter::new();
    let config = UserConfig {
        default_remote_host: Some("gpu01".to_string()),
        ..config(work.path())
    };
    let actions = actions(&runner, &reporter, config, root.path());

    let opts = InitOptions {
        name: Some("project".to_string()),
        container: Some("project-box".to_string()),
        ..InitOptions::default()
    };
    assert_eq!(actions.init(opts.clone(), work.path()).unwrap(), 0);

    let session_dir = root.path().join("project");
    let session = actions.store().load(&session_dir).unwrap();
    assert_eq!(session.container_name, "project-box");
    assert_eq!(session.remote_host.as_deref(), Some("gpu01"));
    let activate = fs::read_to_string(session.activate_script()).unwrap();
    assert!(activate.contains("sshfs gpu01:. "));

    // A second init over the same name is refused.
    assert!(matches!(
        actions.init(opts, work.path()),
        Err(Error::SessionExists(_))
    ));
}

#[test]
fn test_init_local_overrides_default_remote() {
    let work = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new();
    let reporter = MemoryReporter::new();
    let config = UserConfig {
        default_remote_host: Some("gpu01".to_string()),
        ..config(work.path())
    };
    let actions = actions(&runner, &reporter, config, root.path());

    let opts = InitOptions {
        name: Some("local".to_string()),
        local: true,
        image: Some("alpine:3.20".to_string()),
        ..InitOptions::default()
    };
    actions.init(opts, work.path()).unwrap();
    let session = actions.store().load(&root.path().join("local")).unwrap();
    assert_eq!(session.remote_host, None);
    assert_eq!(session.base_image, "alpine:3.20");
    let (letters, timestamp) = session.container_name.split_at(10);
    assert!(letters.chars().all(|c| c.is_ascii_lowercase()));
    assert!(timestamp.parse::<i64>().is_ok());
}

#[test]
fn test_build_requires_dockerfile() {
    let work = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new();
    let reporter = MemoryReporter::new();
    let actions = actions(&runner, &reporter, config(work.path()), root.path());
    actions
        .init(
            InitOptions {
                name: Some("s".to_string()),
                ..InitOptions::default()
            },
            work.path(),
        )
        .unwrap();
    let mut session = actions.store().load(&root.path().join("s")).unwrap();

    assert!(matches!(
        actions.build(&mut session, BuildOptions::default()),
        Err(Error::MissingDockerfile(_))
    ));
    assert_eq!(runner.call_count(), 0);
}

#[test]
fn test_failed_build_leaves_tag_unset() {
    let work = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new();
    let reporter = MemoryReporter::new();
    let actions = actions(&runner, &reporter, config(work.path()), root.path());
    actions
        .init(
            InitOptions {
                name: Some("s".to_string()),
                ..InitOptions::default()
            },
            work.path(),
        )
        .unwrap();
    let session_dir = root.path().join("s");
    let mut session = actions.store().load(&session_dir).unwrap();
    fs::write(work.path().join("Dockerfile.dockerdo"), "FROM ubuntu\n").unwrap();

    runner.push_exit_code(1);
    assert_eq!(
        actions.build(&mut session, BuildOptions::default()).unwrap(),
        1
    );
    assert_eq!(session.image_tag, None);
    assert_eq!(actions.store().load(&session_dir).unwrap().image_tag, None);
}

#[test]
fn test_export_rejects_malformed_pair() {
    let work = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new();
    let reporter = MemoryReporter::new();
    let actions = actions(&runner, &reporter, config(work.path()), root.path());
    actions
        .init(
            InitOptions {
                name: Some("s".to_string()),
                ..InitOptions::default()
            },
            work.path(),
        )
        .unwrap();
    let session_dir = root.path().join("s");
    let mut session = actions.store().load(&session_dir).unwrap();
    let before = fs::read_to_string(session.record_path()).unwrap();

    assert!(matches!(
        actions.export(&mut session, "NOEQUALS"),
        Err(Error::InvalidKeyValue(_))
    ));
    assert!(session.env.is_empty());
    assert!(!session.env_list_path().exists());
    assert_eq!(fs::read_to_string(session.record_path()).unwrap(), before);
}

#[test]
fn test_exec_outside_mount_point() {
    let work = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new();
    let reporter = MemoryReporter::new();
    let actions = actions(&runner, &reporter, config(work.path()), root.path());
    actions
        .init(
            InitOptions {
                name: Some("s".to_string()),
                ..InitOptions::default()
            },
            work.path(),
        )
        .unwrap();
    let mut session = actions.store().load(&root.path().join("s")).unwrap();
    session.ssh_port_on_remote_host = Some(2222);

    let result = actions.exec(&session, &["ls".to_string()], work.path());
    assert!(matches!(result, Err(Error::NotInMount { .. })));
    assert_eq!(runner.call_count(), 0);
    assert!(!session.command_history_path().exists());
}

#[test]
fn test_status_reconciles_and_saves() {
    let work = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new()
        .with_output(CommandOutput::success("{\"Names\":\"box\",\"State\":\"exited\"}\n"));
    let reporter = MemoryReporter::new();
    let actions = actions(&runner, &reporter, config(work.path()), root.path());
    actions
        .init(
            InitOptions {
                name: Some("s".to_string()),
                container: Some("box".to_string()),
                ..InitOptions::default()
            },
            work.path(),
        )
        .unwrap();
    let session_dir = root.path().join("s");
    let mut session = actions.store().load(&session_dir).unwrap();
    session.container_state = ContainerState::Running;
    session.image_tag = Some("img".to_string());

    assert_eq!(actions.status(&mut session).unwrap(), 0);
    assert_eq!(session.container_state, ContainerState::Stopped);
    assert_eq!(
        actions.store().load(&session_dir).unwrap().container_state,
        ContainerState::Stopped
    );
    let calls = runner.calls();
    assert_eq!(calls[0].argv(), vec!["docker", "images", "img"]);
    assert_eq!(calls[1].argv()[..3], ["docker", "ps", "-a"]);
    assert_eq!(calls.len(), 2);

    let warnings = reporter.warnings();
    assert!(warnings
        .iter()
        .any(|w| w.starts_with("No user config found in")));
    assert!(warnings
        .iter()
        .any(|w| w == "Expected container state running, but container is exited"));
}

#[test]
fn test_history_lists_commands() {
    let work = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new();
    let reporter = MemoryReporter::new();
    let actions = actions(&runner, &reporter, config(work.path()), root.path());
    actions
        .init(
            InitOptions {
                name: Some("s".to_string()),
                ..InitOptions::default()
            },
            work.path(),
        )
        .unwrap();
    let session = actions.store().load(&root.path().join("s")).unwrap();
    actions.store().append_history(&session, "make").unwrap();
    actions.store().append_history(&session, "make test").unwrap();

    assert_eq!(actions.history(&session).unwrap(), 0);
    let outputs = reporter.outputs();
    assert_eq!(outputs.last().unwrap(), "make\nmake test");
    let disabled = dockerdo_core::Report::Info("Recording of modified files is disabled".into());
    assert!(reporter.reports().contains(&disabled));
}
