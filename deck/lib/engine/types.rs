use std::{
    fmt::{self, Display},
    path::PathBuf,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::config::PortPair;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The engine flavour behind a [`ContainerEngine`](super::ContainerEngine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineKind {
    /// Podman.
    Podman,

    /// Docker.
    Docker,
}

/// The status of a container as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerStatus {
    /// No such container.
    NotExists,

    /// Created but never started.
    Created,

    /// Running.
    Running,

    /// Exited or stopped.
    Stopped,

    /// Paused.
    Paused,

    /// Being restarted by the engine.
    Restarting,

    /// Being removed.
    Removing,

    /// Failed to be removed or stopped; needs manual removal.
    Dead,

    /// Anything the engine reported that isn't recognized.
    Unknown,
}

/// A container as reported by the engine. Never owned by deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct ContainerRecord {
    /// The container id.
    #[builder(setter(into))]
    pub id: String,

    /// The container name.
    #[builder(setter(into))]
    pub name: String,

    /// The container status.
    pub status: ContainerStatus,

    /// The image the container was created from.
    #[builder(setter(into))]
    pub image_ref: String,

    /// Published ports, as the engine renders them.
    #[builder(default)]
    pub ports: Vec<String>,

    /// When the container was created.
    #[builder(default, setter(strip_option))]
    pub created: Option<DateTime<Utc>>,
}

/// An image as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct ImageRecord {
    /// The image id.
    #[builder(setter(into))]
    pub id: String,

    /// Every `repository:tag` the image is known by.
    #[builder(default)]
    pub references: Vec<String>,

    /// When the image was created.
    #[builder(default, setter(strip_option))]
    pub created: Option<DateTime<Utc>>,
}

/// What to run when creating a new container.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct RunSpec {
    /// The container name.
    #[builder(setter(into))]
    pub name: String,

    /// The image to run.
    #[builder(setter(into))]
    pub image: String,

    /// Ports to publish.
    #[builder(default)]
    pub ports: Vec<PortPair>,

    /// An env file passed with `--env-file`.
    #[builder(default, setter(strip_option))]
    pub env_file: Option<PathBuf>,
}

/// The result of running a command inside a container.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecOutput {
    /// The exit code of the command.
    pub exit_code: i32,

    /// Captured stdout. Empty for interactive sessions.
    pub stdout: String,

    /// Captured stderr. Empty for interactive sessions.
    pub stderr: String,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl EngineKind {
    /// The default binary name of the engine.
    pub fn binary(&self) -> &'static str {
        match self {
            Self::Podman => "podman",
            Self::Docker => "docker",
        }
    }

    /// Renders an engine command line the user could run directly.
    pub fn command_hint(&self, args: &[&str]) -> String {
        let mut hint = self.binary().to_string();
        for arg in args {
            hint.push(' ');
            hint.push_str(arg);
        }
        hint
    }
}

impl ContainerStatus {
    /// Maps the engine's state string (`State` in `ps`, `State.Status` in `inspect`).
    pub fn from_engine_state(state: &str) -> Self {
        match state.trim().to_ascii_lowercase().as_str() {
            "created" | "configured" | "initialized" => Self::Created,
            "running" | "up" => Self::Running,
            "exited" | "stopped" => Self::Stopped,
            "paused" => Self::Paused,
            "restarting" => Self::Restarting,
            "removing" => Self::Removing,
            "dead" => Self::Dead,
            _ => Self::Unknown,
        }
    }

    /// Returns true if the state machine may move from `self` to `next`.
    ///
    /// ```text
    /// NotExists ──create──► Created/Running
    /// Created/Stopped ──start──► Running ──stop──► Stopped
    /// Paused ──unpause──► Running
    /// any existing ──remove──► Removing ──► NotExists
    /// Dead ──remove──► NotExists
    /// ```
    pub fn can_transition_to(&self, next: ContainerStatus) -> bool {
        use ContainerStatus::*;
        match (self, next) {
            (NotExists, Created | Running) => true,
            (Created | Stopped, Running) => true,
            (Running, Stopped | Paused | Restarting) => true,
            (Restarting, Running | Stopped) => true,
            (Paused, Running | Stopped) => true,
            (Removing, NotExists) => true,
            (Dead, NotExists) => true,
            (NotExists | Removing, _) => false,
            (_, Removing) => true,
            _ => false,
        }
    }

    /// Returns true if the container is up and serving.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl ImageRecord {
    /// Returns the first reference whose repository name is exactly `name`.
    pub fn reference_named(&self, name: &str) -> Option<&str> {
        self.references
            .iter()
            .map(String::as_str)
            .find(|reference| repository_name(reference) == name)
    }

    /// The reference used when talking about this image: the first reference, else the id.
    pub fn display_ref(&self) -> &str {
        self.references
            .first()
            .map(String::as_str)
            .unwrap_or(&self.id)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Extracts the bare repository name from an image reference.
///
/// `localhost/app-20250121-1430:latest`, `docker.io/library/app:1` and `app@sha256:..` all reduce
/// to the last path component without tag or digest.
pub fn repository_name(reference: &str) -> &str {
    let without_digest = reference.split('@').next().unwrap_or(reference);
    let last_segment = without_digest
        .rsplit('/')
        .next()
        .unwrap_or(without_digest);
    last_segment.split(':').next().unwrap_or(last_segment)
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.binary())
    }
}

impl Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NotExists => "not-exists",
            Self::Created => "created",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Paused => "paused",
            Self::Restarting => "restarting",
            Self::Removing => "removing",
            Self::Dead => "dead",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", text)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
