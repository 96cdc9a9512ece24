//! The deck configuration stored in `.deck/config.json`.

use std::{
    fmt::{self, Display},
    path::{Path, PathBuf},
    str::FromStr,
};

use getset::Getters;
use serde::{Deserialize, Serialize};
use tokio::fs;
use typed_builder::TypedBuilder;

use crate::{
    utils::{CONFIG_FILENAME, DECK_DIR, DECK_ENGINE_ENV_VAR},
    DeckError, DeckResult,
};

use super::{
    default_env_suffixes, default_production_suffixes, DEFAULT_ENV, DEFAULT_STOP_TIMEOUT_SECS,
    DEFAULT_TEMPLATE_BRANCH,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The deck configuration.
///
/// Components receive this value at construction; nothing reads configuration from global
/// state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder, Getters)]
#[getset(get = "pub with_prefix")]
pub struct DeckConfig {
    /// Which container engine to use.
    #[serde(default)]
    #[builder(default)]
    engine: EnginePreference,

    /// Where templates are synced from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    template_repo: Option<TemplateRepo>,

    /// Environment suffixes recognized when correlating containers, in precedence order.
    #[serde(default = "default_env_suffixes")]
    #[builder(default = default_env_suffixes())]
    env_suffixes: Vec<String>,

    /// Suffixes that mark a container as production.
    #[serde(default = "default_production_suffixes")]
    #[builder(default = default_production_suffixes())]
    production_suffixes: Vec<String>,

    /// The suffix of containers deck creates.
    #[serde(default = "default_env")]
    #[builder(default = self::default_env(), setter(into))]
    default_env: String,

    /// Seconds to wait for a container to stop.
    #[serde(default = "default_stop_timeout_secs")]
    #[builder(default = DEFAULT_STOP_TIMEOUT_SECS)]
    stop_timeout_secs: u32,

    /// Recorded as `CREATED_BY` in image metadata. Falls back to the `USER` variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option, into))]
    created_by: Option<String>,

    /// Which build pipeline rebuilds missing images.
    #[serde(default)]
    #[builder(default)]
    build_pipeline: BuildPipelineKind,

    /// Which template sync client updates templates.
    #[serde(default)]
    #[builder(default)]
    template_sync: TemplateSyncKind,
}

/// The remote repository templates are synced from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder, Getters)]
#[getset(get = "pub with_prefix")]
pub struct TemplateRepo {
    /// The repository url.
    #[builder(setter(into))]
    url: String,

    /// The branch to sync.
    #[serde(default = "default_branch")]
    #[builder(default = default_branch(), setter(into))]
    branch: String,
}

/// The container engine to drive.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnginePreference {
    /// Podman if installed, else Docker.
    #[default]
    Auto,

    /// Podman only.
    Podman,

    /// Docker only.
    Docker,
}

/// The build pipeline implementation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildPipelineKind {
    /// Build with the engine's own `build` command.
    #[default]
    Engine,

    /// Builds are refused.
    Disabled,
}

/// The template sync implementation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateSyncKind {
    /// Sync with the `git` command line.
    #[default]
    Git,

    /// Sync does nothing.
    Disabled,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl DeckConfig {
    /// Returns the path of the config file for a project.
    pub fn path(project_dir: &Path) -> PathBuf {
        project_dir.join(DECK_DIR).join(CONFIG_FILENAME)
    }

    /// Loads the configuration of a project.
    ///
    /// A missing config file yields the defaults. The `DECK_ENGINE` environment variable, when
    /// set, overrides the configured engine.
    pub async fn load(project_dir: &Path) -> DeckResult<Self> {
        let path = Self::path(project_dir);
        let mut config = if fs::try_exists(&path)
            .await
            .map_err(|e| DeckError::fs(&path, e))?
        {
            let contents = fs::read_to_string(&path)
                .await
                .map_err(|e| DeckError::fs(&path, e))?;
            serde_json::from_str::<DeckConfig>(&contents)
                .map_err(|source| DeckError::ConfigParse { path, source })?
        } else {
            tracing::debug!("no config at {}, using defaults", path.display());
            DeckConfig::default()
        };

        if let Ok(value) = std::env::var(DECK_ENGINE_ENV_VAR) {
            match value.parse::<EnginePreference>() {
                Ok(engine) => {
                    tracing::debug!("engine overridden by {}: {}", DECK_ENGINE_ENV_VAR, engine);
                    config.engine = engine;
                }
                Err(_) => tracing::warn!("ignoring invalid {}={}", DECK_ENGINE_ENV_VAR, value),
            }
        }

        Ok(config)
    }

    /// Writes the configuration to the project's config file.
    pub async fn save(&self, project_dir: &Path) -> DeckResult<()> {
        let path = Self::path(project_dir);
        let contents = serde_json::to_string_pretty(self)?;
        deckutils::write_atomic(&path, format!("{}\n", contents)).await?;
        Ok(())
    }

    /// The user recorded in image metadata.
    pub fn creator(&self) -> String {
        self.created_by
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .or_else(|| std::env::var("USERNAME").ok())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Returns true if `suffix` marks a production container.
    pub fn is_production_suffix(&self, suffix: &str) -> bool {
        self.production_suffixes.iter().any(|s| s == suffix)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn default_env() -> String {
    DEFAULT_ENV.to_string()
}

fn default_branch() -> String {
    DEFAULT_TEMPLATE_BRANCH.to_string()
}

fn default_stop_timeout_secs() -> u32 {
    DEFAULT_STOP_TIMEOUT_SECS
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for DeckConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Display for EnginePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Podman => write!(f, "podman"),
            Self::Docker => write!(f, "docker"),
        }
    }
}

impl FromStr for EnginePreference {
    type Err = DeckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "podman" => Ok(Self::Podman),
            "docker" => Ok(Self::Docker),
            other => Err(DeckError::custom(anyhow::anyhow!(
                "unknown engine '{}', expected podman, docker or auto",
                other
            ))),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = DeckConfig::default();
        assert_eq!(config.get_engine(), &EnginePreference::Auto);
        assert_eq!(config.get_default_env(), "dev");
        assert_eq!(config.get_env_suffixes(), &["dev", "test", "prod", "production"]);
        assert!(config.is_production_suffix("prod"));
        assert!(!config.is_production_suffix("test"));
    }

    #[test]
    fn test_default_config_file_parses() {
        let config: DeckConfig = serde_json::from_str(super::super::DEFAULT_CONFIG).unwrap();
        assert_eq!(config, DeckConfig::default());
    }

    #[tokio::test]
    #[serial]
    async fn test_load_missing_config_uses_defaults() {
        std::env::remove_var(DECK_ENGINE_ENV_VAR);
        let dir = tempfile::tempdir().unwrap();
        let config = DeckConfig::load(dir.path()).await.unwrap();
        assert_eq!(config, DeckConfig::default());
    }

    #[tokio::test]
    #[serial]
    async fn test_load_applies_engine_override() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(DECK_DIR)).unwrap();
        std::fs::write(
            DeckConfig::path(dir.path()),
            r#"{"engine": "podman", "template_repo": {"url": "https://example.com/t.git"}}"#,
        )
        .unwrap();

        std::env::set_var(DECK_ENGINE_ENV_VAR, "docker");
        let config = DeckConfig::load(dir.path()).await.unwrap();
        std::env::remove_var(DECK_ENGINE_ENV_VAR);

        assert_eq!(config.get_engine(), &EnginePreference::Docker);
        let repo = config.get_template_repo().as_ref().unwrap();
        assert_eq!(repo.get_branch(), "main");
    }

    #[tokio::test]
    #[serial]
    async fn test_load_reports_parse_errors_with_path() {
        std::env::remove_var(DECK_ENGINE_ENV_VAR);
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(DECK_DIR)).unwrap();
        std::fs::write(DeckConfig::path(dir.path()), "{ not json").unwrap();

        let err = DeckConfig::load(dir.path()).await.unwrap_err();
        assert!(matches!(err, DeckError::ConfigParse { path, .. } if path.ends_with("config.json")));
    }

    #[tokio::test]
    #[serial]
    async fn test_save_round_trips() {
        std::env::remove_var(DECK_ENGINE_ENV_VAR);
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(DECK_DIR)).unwrap();

        let config = DeckConfig::builder()
            .engine(EnginePreference::Podman)
            .created_by("alice")
            .build();
        config.save(dir.path()).await.unwrap();

        assert_eq!(DeckConfig::load(dir.path()).await.unwrap(), config);
    }
}
