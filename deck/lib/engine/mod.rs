//! The container engine adapter.
//!
//! Deck never talks to an engine socket. Everything goes through the engine's command line,
//! whose JSON output is parsed into [`ContainerRecord`]s and [`ImageRecord`]s. The
//! [`ContainerEngine`] trait is the only thing the orchestration code depends on; [`CliEngine`]
//! drives Podman or Docker and [`FixtureEngine`] keeps everything in memory.

mod cli;
mod detect;
mod fixture;
mod types;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use cli::*;
pub use detect::*;
pub use fixture::*;
pub use types::*;

use async_trait::async_trait;

use crate::DeckResult;

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// A uniform interface over the installed container engine.
///
/// Implementations never retry; a failed call is reported once with the engine's diagnostic.
/// Records are never cached: every call re-queries the engine.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// The engine flavour, used to render command hints.
    fn kind(&self) -> EngineKind;

    /// Lists all containers, whatever their state.
    async fn list_containers(&self) -> DeckResult<Vec<ContainerRecord>>;

    /// Lists all images.
    async fn list_images(&self) -> DeckResult<Vec<ImageRecord>>;

    /// Looks up a container by exact name.
    async fn inspect_container(&self, name: &str) -> DeckResult<Option<ContainerRecord>> {
        Ok(self
            .list_containers()
            .await?
            .into_iter()
            .find(|container| container.name == name))
    }

    /// Starts a created or stopped container.
    async fn start_container(&self, name: &str) -> DeckResult<()>;

    /// Stops a running container.
    async fn stop_container(&self, name: &str, timeout_secs: u32) -> DeckResult<()>;

    /// Restarts a container.
    async fn restart_container(&self, name: &str) -> DeckResult<()>;

    /// Resumes a paused container.
    async fn unpause_container(&self, name: &str) -> DeckResult<()>;

    /// Removes a container. `force` also removes running containers.
    async fn remove_container(&self, name: &str, force: bool) -> DeckResult<()>;

    /// Removes an image.
    async fn remove_image(&self, reference: &str, force: bool) -> DeckResult<()>;

    /// Creates and starts a detached container, returning its id.
    async fn run_container(&self, spec: &RunSpec) -> DeckResult<String>;

    /// Runs a command inside a running container.
    async fn exec(&self, name: &str, command: &[String], interactive: bool) -> DeckResult<ExecOutput>;

    /// Fetches the logs of a container. `tail` limits the output to the last lines.
    async fn logs(&self, name: &str, tail: Option<usize>) -> DeckResult<String>;

    /// Removes dangling images and build cache.
    async fn prune_build_cache(&self) -> DeckResult<()>;
}
