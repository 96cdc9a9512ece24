use std::{
    error::Error,
    fmt::{self, Display},
    path::PathBuf,
};
use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a deck-related operation.
pub type DeckResult<T> = Result<T, DeckError>;

/// An error that occurred during a deck operation.
#[derive(Debug, Error)]
pub enum DeckError {
    /// A filesystem operation failed on a specific path.
    #[error("filesystem error at {path}: {source}")]
    FileSystem {
        /// The path the operation was acting on.
        path: PathBuf,

        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An io error without an associated path.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from the shared utilities crate.
    #[error(transparent)]
    Utils(#[from] deckutils::DeckutilsError),

    /// An error that can represent any error.
    #[error(transparent)]
    Custom(#[from] AnyError),

    /// Neither podman nor docker could be found.
    #[error("no container engine found (tried: {0})")]
    EngineNotFound(String),

    /// The engine exited with a non-zero status.
    #[error("engine command `{command}` failed{}: {diagnostic}", .exit_code.map(|c| format!(" with exit code {}", c)).unwrap_or_default())]
    Engine {
        /// The command line that was run.
        command: String,

        /// The exit code, if the process exited normally.
        exit_code: Option<i32>,

        /// The raw stderr (or stdout) from the engine.
        diagnostic: String,
    },

    /// The engine produced output that could not be parsed.
    #[error("malformed output from `{command}`: {reason}")]
    MalformedEngineOutput {
        /// The command line that was run.
        command: String,

        /// What went wrong while parsing.
        reason: String,
    },

    /// No free port could be found in the scanned range.
    #[error("no available port for {port_type} in range {start}-{end}")]
    PortConflict {
        /// The port type being allocated.
        port_type: String,

        /// First port scanned.
        start: u16,

        /// Last port scanned.
        end: u16,
    },

    /// An attempt was made to modify a protected file in an Images entry.
    #[error("refusing to modify protected file {0}: image entries are immutable apart from their metadata")]
    PermissionViolation(PathBuf),

    /// A cleanup was blocked by a production container.
    #[error("cleanup blocked: production container '{container}' references '{resource}'")]
    ProductionGuardTriggered {
        /// The resource the cleanup targeted.
        resource: String,

        /// The production container that triggered the guard.
        container: String,
    },

    /// A resource directory was not found.
    #[error("{layer} resource '{name}' not found at {path}")]
    ResourceNotFound {
        /// The layer that was searched.
        layer: String,

        /// The resource name.
        name: String,

        /// The path that was expected to exist.
        path: PathBuf,
    },

    /// No container belongs to a resource.
    #[error("no container found for '{0}'")]
    ContainerNotFound(String),

    /// A resource already exists where a new one was about to be created.
    #[error("resource already exists at {0}")]
    ResourceExists(PathBuf),

    /// A resource is missing required files.
    #[error("resource '{name}' is incomplete, missing: {}", .missing.join(", "))]
    ResourceIncomplete {
        /// The resource name.
        name: String,

        /// The files that are missing.
        missing: Vec<String>,
    },

    /// A resource name is not usable as a directory name.
    #[error("invalid resource name '{0}'")]
    InvalidResourceName(String),

    /// A promotion between two layers that is not allowed.
    #[error("cannot promote from {from} to {to}")]
    InvalidPromotion {
        /// The source layer.
        from: String,

        /// The target layer.
        to: String,
    },

    /// An invalid layer name.
    #[error("invalid layer: {0}")]
    InvalidLayer(String),

    /// An invalid port pair.
    #[error("invalid port pair: {0}")]
    InvalidPortPair(String),

    /// The metadata file of an image entry could not be parsed.
    #[error("invalid metadata in {path}: {reason}")]
    InvalidMetadata {
        /// The metadata file.
        path: PathBuf,

        /// What was wrong.
        reason: String,
    },

    /// The configuration file could not be parsed.
    #[error("failed to parse config at {path}: {source}")]
    ConfigParse {
        /// The config file.
        path: PathBuf,

        /// The json error.
        #[source]
        source: serde_json::Error,
    },

    /// An error serializing or deserializing json.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The `.env` file of a resource could not be parsed.
    #[error("failed to parse env file {path}: {reason}")]
    EnvFile {
        /// The env file.
        path: PathBuf,

        /// What went wrong.
        reason: String,
    },

    /// The build pipeline failed.
    #[error("build of '{image}' failed: {diagnostic}")]
    BuildFailed {
        /// The image being built.
        image: String,

        /// The raw diagnostic from the build.
        diagnostic: String,
    },

    /// Templates could not be synced from their repository.
    #[error("failed to sync templates from {repo}: {diagnostic}")]
    TemplateSync {
        /// The repository url.
        repo: String,

        /// What went wrong.
        diagnostic: String,
    },

    /// No template repository is configured.
    #[error("no template repository configured; set template_repo in .deck/config.json")]
    TemplateRepoNotConfigured,

    /// The build pipeline is disabled by configuration.
    #[error("builds are disabled in the deck configuration")]
    BuildDisabled,

    /// The operation was cancelled.
    #[error("operation cancelled: {0}")]
    Cancelled(String),

    /// An error that occurred when a join handle returned an error.
    #[error("join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

/// An error that can represent any error.
#[derive(Debug)]
pub struct AnyError {
    error: anyhow::Error,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl DeckError {
    /// Creates a new `Err` result.
    pub fn custom(error: impl Into<anyhow::Error>) -> DeckError {
        DeckError::Custom(AnyError {
            error: error.into(),
        })
    }

    /// Wraps an I/O error together with the path it happened on.
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> DeckError {
        DeckError::FileSystem {
            path: path.into(),
            source,
        }
    }
}

impl AnyError {
    /// Downcasts the error to a `T`.
    pub fn downcast<T>(&self) -> Option<&T>
    where
        T: Display + fmt::Debug + Send + Sync + 'static,
    {
        self.error.downcast_ref::<T>()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Creates an `Ok` `DeckResult`.
#[allow(non_snake_case)]
pub fn Ok<T>(value: T) -> DeckResult<T> {
    Result::Ok(value)
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl PartialEq for AnyError {
    fn eq(&self, other: &Self) -> bool {
        self.error.to_string() == other.error.to_string()
    }
}

impl Display for AnyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl Error for AnyError {}
