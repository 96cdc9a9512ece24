use std::{path::PathBuf, process::Stdio};

use tokio::process::Command;

use crate::{
    config::EnginePreference,
    utils::{DOCKER_PATH_ENV_VAR, PODMAN_PATH_ENV_VAR},
    DeckError, DeckResult,
};

use super::{CliEngine, EngineKind};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Selects the container engine to drive.
///
/// With [`EnginePreference::Auto`] podman is tried first, then docker. An engine counts as
/// installed when its binary resolves and answers `--version`. The binary may be pinned with
/// `DECK_PODMAN_PATH` / `DECK_DOCKER_PATH`.
pub async fn detect_engine(preference: EnginePreference) -> DeckResult<CliEngine> {
    let candidates: &[EngineKind] = match preference {
        EnginePreference::Auto => &[EngineKind::Podman, EngineKind::Docker],
        EnginePreference::Podman => &[EngineKind::Podman],
        EnginePreference::Docker => &[EngineKind::Docker],
    };

    for kind in candidates {
        match probe_engine(*kind).await {
            Some(binary) => {
                tracing::info!("using {} at {}", kind, binary.display());
                return Ok(CliEngine::new(*kind, binary));
            }
            None => tracing::debug!("{} not available", kind),
        }
    }

    Err(DeckError::EngineNotFound(
        candidates
            .iter()
            .map(|kind| kind.binary())
            .collect::<Vec<_>>()
            .join(", "),
    ))
}

/// Returns the binary path of `kind` if it is installed and responds to `--version`.
pub async fn probe_engine(kind: EngineKind) -> Option<PathBuf> {
    let env_var = match kind {
        EngineKind::Podman => PODMAN_PATH_ENV_VAR,
        EngineKind::Docker => DOCKER_PATH_ENV_VAR,
    };

    let configured = match deckutils::resolve_env_path(env_var, kind.binary()) {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!("ignoring {}: {}", env_var, e);
            return None;
        }
    };

    let binary = which::which(&configured).ok()?;
    let status = Command::new(&binary)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await
        .ok()?;

    status.success().then_some(binary)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
