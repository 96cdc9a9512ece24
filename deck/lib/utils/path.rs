//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The directory, relative to a project root, where deck keeps its resources.
pub const DECK_DIR: &str = ".deck";

/// The sub directory holding synced templates.
pub const TEMPLATES_SUBDIR: &str = "templates";

/// The sub directory holding user-editable configurations.
pub const CUSTOM_SUBDIR: &str = "custom";

/// The sub directory holding timestamped build records.
pub const IMAGES_SUBDIR: &str = "images";

/// The deck configuration file inside [`DECK_DIR`].
pub const CONFIG_FILENAME: &str = "config.json";

/// The metadata file written into every Images entry.
pub const METADATA_FILENAME: &str = ".deck-metadata";

/// The environment file every resource must carry.
pub const ENV_FILENAME: &str = ".env";

/// Accepted compose file names, in lookup order.
pub const COMPOSE_FILENAMES: &[&str] = &[
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
];

/// Accepted container build file names, in lookup order.
pub const BUILD_FILENAMES: &[&str] = &["Dockerfile", "Containerfile"];

/// Environment variable overriding the engine preference (`podman`, `docker` or `auto`).
pub const DECK_ENGINE_ENV_VAR: &str = "DECK_ENGINE";

/// Environment variable pointing at a specific podman binary.
pub const PODMAN_PATH_ENV_VAR: &str = "DECK_PODMAN_PATH";

/// Environment variable pointing at a specific docker binary.
pub const DOCKER_PATH_ENV_VAR: &str = "DECK_DOCKER_PATH";

/// The git directory skipped when listing synced templates.
pub const GIT_DIR: &str = ".git";
