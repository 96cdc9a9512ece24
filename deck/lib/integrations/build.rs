use std::{
    path::{Path, PathBuf},
    process::Stdio,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use tokio::process::Command;

use crate::{
    config::{BuildPipelineKind, DeckConfig},
    engine::{CliEngine, ContainerEngine, EngineKind, FixtureEngine, ImageRecord},
    resources::RequiredFile,
    DeckError, DeckResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Builds the engine image of an Images entry.
#[async_trait]
pub trait BuildPipeline: Send + Sync {
    /// Builds `image_name` from the entry whose compose file is `compose_path`.
    async fn build(&self, compose_path: &Path, image_name: &str) -> DeckResult<()>;
}

/// Builds with `<engine> build --tag <image> --file <build file> <entry dir>`.
#[derive(Debug, Clone)]
pub struct EngineBuildPipeline {
    kind: EngineKind,
    binary: PathBuf,
}

/// Refuses every build.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledBuildPipeline;

/// Registers the built image in a [`FixtureEngine`] without building anything.
#[derive(Debug)]
pub struct FixtureBuildPipeline {
    engine: Arc<FixtureEngine>,
    failure: Option<String>,
    builds: Mutex<Vec<String>>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl EngineBuildPipeline {
    /// Creates a pipeline building with the same binary as `engine`.
    pub fn new(engine: &CliEngine) -> Self {
        Self {
            kind: engine.kind(),
            binary: engine.binary().to_path_buf(),
        }
    }
}

impl FixtureBuildPipeline {
    /// Creates a pipeline whose builds succeed.
    pub fn new(engine: Arc<FixtureEngine>) -> Self {
        Self {
            engine,
            failure: None,
            builds: Mutex::new(Vec::new()),
        }
    }

    /// Creates a pipeline whose builds fail with `diagnostic`.
    pub fn failing(engine: Arc<FixtureEngine>, diagnostic: impl Into<String>) -> Self {
        Self {
            failure: Some(diagnostic.into()),
            ..Self::new(engine)
        }
    }

    /// The images built so far.
    pub fn builds(&self) -> Vec<String> {
        self.builds
            .lock()
            .map(|builds| builds.clone())
            .unwrap_or_default()
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl BuildPipeline for EngineBuildPipeline {
    async fn build(&self, compose_path: &Path, image_name: &str) -> DeckResult<()> {
        let context = compose_path.parent().ok_or_else(|| DeckError::BuildFailed {
            image: image_name.to_string(),
            diagnostic: format!("{} has no parent directory", compose_path.display()),
        })?;

        let build_file = RequiredFile::Build
            .find_in(context)
            .await?
            .ok_or_else(|| DeckError::BuildFailed {
                image: image_name.to_string(),
                diagnostic: format!("no build file in {}", context.display()),
            })?;

        let build_file = build_file.display().to_string();
        let context_arg = context.display().to_string();
        let args = ["build", "--tag", image_name, "--file", &build_file, &context_arg];
        tracing::info!("building {}: {}", image_name, self.kind.command_hint(&args));

        // Build output streams to the user's terminal; only stderr is kept for the report.
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DeckError::BuildFailed {
                image: image_name.to_string(),
                diagnostic: e.to_string(),
            })?
            .wait_with_output()
            .await?;

        if !output.status.success() {
            return Err(DeckError::BuildFailed {
                image: image_name.to_string(),
                diagnostic: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl BuildPipeline for DisabledBuildPipeline {
    async fn build(&self, _compose_path: &Path, image_name: &str) -> DeckResult<()> {
        tracing::warn!("not building {}: builds are disabled", image_name);
        Err(DeckError::BuildDisabled)
    }
}

#[async_trait]
impl BuildPipeline for FixtureBuildPipeline {
    async fn build(&self, _compose_path: &Path, image_name: &str) -> DeckResult<()> {
        if let Ok(mut builds) = self.builds.lock() {
            builds.push(image_name.to_string());
        }

        if let Some(diagnostic) = &self.failure {
            return Err(DeckError::BuildFailed {
                image: image_name.to_string(),
                diagnostic: diagnostic.clone(),
            });
        }

        self.engine.add_image(
            ImageRecord::builder()
                .id(format!("sha256:{}", image_name))
                .references(vec![format!("localhost/{}:latest", image_name)])
                .build(),
        );

        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Picks the build pipeline named in the configuration.
pub fn build_pipeline_from_config(config: &DeckConfig, engine: &CliEngine) -> Arc<dyn BuildPipeline> {
    match config.get_build_pipeline() {
        BuildPipelineKind::Engine => Arc::new(EngineBuildPipeline::new(engine)),
        BuildPipelineKind::Disabled => Arc::new(DisabledBuildPipeline),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixture_build_registers_image() {
        let engine = Arc::new(FixtureEngine::default());
        let pipeline = FixtureBuildPipeline::new(engine.clone());

        pipeline
            .build(Path::new("/tmp/app/docker-compose.yml"), "app-20250121-1430")
            .await
            .unwrap();

        let images = engine.list_images().await.unwrap();
        assert_eq!(images.len(), 1);
        assert!(images[0].reference_named("app-20250121-1430").is_some());
        assert_eq!(pipeline.builds(), vec!["app-20250121-1430"]);
    }

    #[tokio::test]
    async fn test_failing_and_disabled_pipelines() {
        let engine = Arc::new(FixtureEngine::default());
        let failing = FixtureBuildPipeline::failing(engine.clone(), "npm ci exited with 1");
        let err = failing
            .build(Path::new("/tmp/app/compose.yaml"), "app")
            .await
            .unwrap_err();
        assert!(matches!(err, DeckError::BuildFailed { diagnostic, .. } if diagnostic == "npm ci exited with 1"));
        assert!(engine.images().is_empty());

        let err = DisabledBuildPipeline
            .build(Path::new("/tmp/app/compose.yaml"), "app")
            .await
            .unwrap_err();
        assert!(matches!(err, DeckError::BuildDisabled));
    }

    #[tokio::test]
    async fn test_engine_build_requires_build_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("compose.yaml"), "services: {}\n").unwrap();

        let pipeline = EngineBuildPipeline::new(&CliEngine::podman());
        let err = pipeline
            .build(&dir.path().join("compose.yaml"), "app")
            .await
            .unwrap_err();
        assert!(matches!(err, DeckError::BuildFailed { diagnostic, .. } if diagnostic.contains("no build file")));
    }
}
