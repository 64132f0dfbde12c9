//! Reconciling the cached container state with the Docker daemon.

use serde::Deserialize;
use tracing::{debug, info};

use dockerdo_core::{ContainerState, Result, Session};
use dockerdo_shell::Gateway;

/// One line of `docker ps --format json`.
#[derive(Debug, Deserialize)]
struct PsEntry {
    #[serde(rename = "Names", default)]
    names: String,
    #[serde(rename = "State")]
    state: String,
}

impl PsEntry {
    fn has_name(&self, name: &str) -> bool {
        self.names.split(',').any(|n| n.trim() == name)
    }
}

/// Extract the Docker `State` of `container_name` from `docker ps` output.
///
/// The name filter of `docker ps` matches substrings, so only the line
/// naming the container exactly counts. A line without names is taken as
/// is. Returns `None` when no line belongs to the container.
pub fn parse_ps_output(output: &str, container_name: &str) -> Result<Option<String>> {
    let entries = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(serde_json::from_str::<PsEntry>)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let chosen = entries
        .iter()
        .find(|entry| entry.has_name(container_name))
        .or_else(|| entries.iter().find(|entry| entry.names.is_empty()));
    Ok(chosen.map(|entry| entry.state.clone()))
}

/// Ask Docker for the real container state and update `session` to match.
///
/// Returns `true` if the container is running. Problems are reported and
/// yield `false`; the session is not persisted here. In a dry run the
/// cached state is trusted.
pub fn verify_container_state(session: &mut Session, gateway: &Gateway<'_>) -> bool {
    let reporter = gateway.reporter();
    let filter = format!("name={}", session.container_name);
    let args = ["docker", "ps", "-a", "--filter", filter.as_str(), "--format", "json"];

    let output = match gateway.output_on_host(&args, session) {
        Ok(Some(output)) => output,
        Ok(None) => return session.is_running(),
        Err(e) => {
            reporter.error(&format!("Error running docker ps: {e}"));
            return false;
        }
    };
    if !output.is_success() {
        reporter.error(&format!("Error running docker ps: exit code {}", output.code));
        return false;
    }

    let docker_state = match parse_ps_output(&output.stdout_text(), &session.container_name) {
        Ok(state) => state,
        Err(e) => {
            reporter.error(&format!("Error decoding docker ps output: {e}"));
            return false;
        }
    };

    let observed = match &docker_state {
        None => ContainerState::Nothing,
        Some(state) => match ContainerState::from_docker(state) {
            Some(observed) => observed,
            None => {
                reporter.error(&format!("Unexpected container state: {state}"));
                return false;
            }
        },
    };

    let cached = session.container_state;
    if cached != observed {
        let actual = match &docker_state {
            None => "no container found".to_string(),
            Some(state) => format!("container is {state}"),
        };
        reporter.warning(&format!(
            "Expected container state {cached}, but {actual}"
        ));
        info!(
            "Container {} state corrected: {} -> {}",
            session.container_name, cached, observed
        );
        session.container_state = observed;
    } else {
        debug!("Container {} is {}", session.container_name, observed);
    }
    observed == ContainerState::Running
}
