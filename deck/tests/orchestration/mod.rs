mod catalog;
mod cleanup;
mod resources;
mod start;

use std::{path::PathBuf, sync::Arc};

use chrono::{TimeZone, Utc};
use deck::{
    config::DeckConfig,
    engine::{ContainerRecord, ContainerStatus, FixtureEngine, ImageRecord},
    integrations::{FixtureBuildPipeline, NoopTemplateSync},
    management::Deck,
    ports::{FixturePortProbe, PortResolver},
    resources::Layer,
};
use tempfile::TempDir;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A project in a temporary directory, backed by an in-memory engine.
pub struct Project {
    pub dir: TempDir,
    pub engine: Arc<FixtureEngine>,
    pub builder: Arc<FixtureBuildPipeline>,
    pub deck: Deck,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Project {
    pub fn new() -> Self {
        Self::with_probe(FixturePortProbe::default())
    }

    pub fn with_probe(probe: FixturePortProbe) -> Self {
        let engine = Arc::new(FixtureEngine::default());
        Self::assemble(probe, engine.clone(), FixtureBuildPipeline::new(engine))
    }

    pub fn with_failing_build(diagnostic: &str) -> Self {
        let engine = Arc::new(FixtureEngine::default());
        Self::assemble(
            FixturePortProbe::default(),
            engine.clone(),
            FixtureBuildPipeline::failing(engine, diagnostic),
        )
    }

    fn assemble(probe: FixturePortProbe, engine: Arc<FixtureEngine>, builder: FixtureBuildPipeline) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let builder = Arc::new(builder);
        let deck = Deck::with_parts(
            dir.path(),
            DeckConfig::builder().created_by("alice").build(),
            engine.clone(),
            PortResolver::new(Arc::new(probe)),
            builder.clone(),
            Arc::new(NoopTemplateSync),
        );

        Self {
            dir,
            engine,
            builder,
            deck,
        }
    }

    /// Writes a complete entry.
    pub fn write_entry(&self, layer: Layer, name: &str, env: &str) -> PathBuf {
        let path = self.deck.directories().entry_path(layer, name);
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join(".env"), env).unwrap();
        std::fs::write(path.join("docker-compose.yml"), "services:\n  app:\n    build: .\n").unwrap();
        std::fs::write(path.join("Dockerfile"), "FROM node:20-alpine\n").unwrap();
        path
    }

    /// Promotes a Custom entry into Images as if it happened on 2025-01-21 at 14:30 UTC.
    pub async fn freeze(&self, custom: &str) -> String {
        let at = Utc.with_ymd_and_hms(2025, 1, 21, 14, 30, 0).unwrap();
        self.deck
            .directories()
            .promote_at(Layer::Custom, custom, Layer::Images, at)
            .await
            .unwrap()
    }

    /// Registers the engine image an Images entry builds into.
    pub fn add_built_image(&self, name: &str) -> String {
        let reference = format!("localhost/{}:latest", name);
        self.engine.add_image(
            ImageRecord::builder()
                .id(format!("sha256:{}", name))
                .references(vec![reference.clone()])
                .build(),
        );
        reference
    }

    pub fn add_container(&self, name: &str, status: ContainerStatus, image_ref: &str) {
        self.engine.add_container(
            ContainerRecord::builder()
                .id(format!("id-{}", name))
                .name(name)
                .status(status)
                .image_ref(image_ref)
                .build(),
        );
    }

    /// Every file under `.deck`, relative and sorted.
    pub fn tree(&self) -> Vec<String> {
        fn walk(dir: &std::path::Path, root: &std::path::Path, out: &mut Vec<String>) {
            let Ok(read_dir) = std::fs::read_dir(dir) else {
                return;
            };
            for entry in read_dir.flatten() {
                let path = entry.path();
                out.push(path.strip_prefix(root).unwrap().display().to_string());
                if path.is_dir() {
                    walk(&path, root, out);
                }
            }
        }

        let root = self.deck.directories().deck_dir().to_path_buf();
        let mut out = Vec::new();
        walk(&root, &root, &mut out);
        out.sort();
        out
    }
}
