use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    catalog::{ResourceCatalog, UnifiedResourceList},
    cleanup::CleanupEngine,
    config::DeckConfig,
    engine::{detect_engine, ContainerEngine},
    integrations::{
        build_pipeline_from_config, template_sync_from_config, BuildPipeline, Selector,
        TemplateSync,
    },
    lifecycle::SmartStarter,
    ports::{PortCheckResult, PortResolver},
    report::OperationReport,
    resources::{DirectoryManager, Layer, RequiredFile, ResourceEntry},
    utils::{cancellable, read_declared_ports, rewrite_env_ports, DECK_DIR},
    DeckError, DeckResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A deck project with every component wired up.
///
/// Components are built on demand from the same configuration, engine and collaborators, so
/// each command sees one consistent setup.
pub struct Deck {
    project_dir: PathBuf,
    config: DeckConfig,
    engine: Arc<dyn ContainerEngine>,
    directories: DirectoryManager,
    ports: PortResolver,
    builder: Arc<dyn BuildPipeline>,
    sync: Arc<dyn TemplateSync>,
}

/// The port check of one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortReport {
    /// The entry's layer.
    pub layer: Layer,

    /// The entry name.
    pub entry: String,

    /// One check per declared port.
    pub checks: Vec<PortCheckResult>,

    /// Ports written into the entry's `.env`, by key.
    pub rewritten: BTreeMap<String, u16>,

    /// The user-facing report.
    pub report: OperationReport,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Deck {
    /// Opens the project at `project_dir`, detecting the container engine.
    ///
    /// The project doesn't have to be initialized; missing layers read as empty.
    pub async fn open(project_dir: impl Into<PathBuf>) -> DeckResult<Self> {
        let project_dir = project_dir.into();
        let config = DeckConfig::load(&project_dir).await?;

        let engine = detect_engine(*config.get_engine()).await?;
        tracing::debug!("using {} at {}", engine.kind().binary(), engine.binary().display());

        let builder = build_pipeline_from_config(&config, &engine);
        let sync = template_sync_from_config(&config);

        Ok(Self::with_parts(
            project_dir,
            config,
            Arc::new(engine),
            PortResolver::system(),
            builder,
            sync,
        ))
    }

    /// Assembles a project from explicit parts.
    pub fn with_parts(
        project_dir: impl Into<PathBuf>,
        config: DeckConfig,
        engine: Arc<dyn ContainerEngine>,
        ports: PortResolver,
        builder: Arc<dyn BuildPipeline>,
        sync: Arc<dyn TemplateSync>,
    ) -> Self {
        let project_dir = project_dir.into();
        let directories = DirectoryManager::for_project(&project_dir, &config);
        Self {
            project_dir,
            config,
            engine,
            directories,
            ports,
            builder,
            sync,
        }
    }

    /// The project directory.
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// The loaded configuration.
    pub fn config(&self) -> &DeckConfig {
        &self.config
    }

    /// The container engine.
    pub fn engine(&self) -> &Arc<dyn ContainerEngine> {
        &self.engine
    }

    /// The directory manager of the project.
    pub fn directories(&self) -> &DirectoryManager {
        &self.directories
    }

    /// A catalog over the project.
    pub fn catalog(&self) -> ResourceCatalog {
        ResourceCatalog::new(self.engine.clone(), self.directories.clone(), self.config.clone())
    }

    /// A smart starter over the project.
    pub fn starter(&self) -> SmartStarter {
        SmartStarter::new(
            self.engine.clone(),
            self.directories.clone(),
            self.ports.clone(),
            self.builder.clone(),
            self.config.clone(),
        )
    }

    /// A cleanup engine over the project.
    pub fn cleaner(&self) -> CleanupEngine {
        CleanupEngine::new(self.engine.clone(), self.directories.clone(), self.config.clone())
    }

    /// Builds the unified catalog.
    pub async fn list(&self, env_filter: Option<&str>) -> DeckResult<UnifiedResourceList> {
        self.catalog().build_catalog(env_filter).await
    }

    /// Syncs the Templates layer from the configured repository.
    pub async fn update_templates(&self, cancel: &CancellationToken) -> DeckResult<OperationReport> {
        let repo = self
            .config
            .get_template_repo()
            .as_ref()
            .ok_or(DeckError::TemplateRepoNotConfigured)?;
        let dest = self.directories.layer_dir(Layer::Templates);
        tracing::info!("syncing templates from {} ({})", repo.get_url(), repo.get_branch());

        cancellable(
            cancel,
            "syncing templates",
            self.sync
                .sync_templates(repo.get_url(), repo.get_branch(), &dest),
        )
        .await?;

        let templates = self.directories.list_entries(Layer::Templates).await?;
        let incomplete: Vec<String> = templates
            .iter()
            .filter(|t| !t.is_complete())
            .map(|t| t.name.clone())
            .collect();

        let report = OperationReport::success(format!(
            "synced {} template(s) from {}",
            templates.len(),
            repo.get_url()
        ));
        Ok(match incomplete.is_empty() {
            true => report,
            false => report.with_hint(format!("incomplete templates: {}", incomplete.join(", "))),
        })
    }

    /// Promotes an entry into the next layer and returns the new entry.
    pub async fn promote(&self, source: Layer, name: &str) -> DeckResult<ResourceEntry> {
        let target = source.promotes_to().ok_or_else(|| DeckError::InvalidPromotion {
            from: source.to_string(),
            to: "nothing".to_string(),
        })?;

        let new_name = self.directories.promote(source, name, target).await?;
        self.directories.entry(target, &new_name).await
    }

    /// Checks the declared ports of an entry.
    ///
    /// With `fix`, taken ports of a Custom entry are replaced by their suggestions in its
    /// `.env`. Images entries are never rewritten; their substitutes are published at start.
    pub async fn check_ports(&self, layer: Layer, name: &str, fix: bool) -> DeckResult<PortReport> {
        let entry = self.directories.entry(layer, name).await?;
        let env_file = entry
            .env_file()
            .map(Path::to_path_buf)
            .ok_or_else(|| DeckError::ResourceIncomplete {
                name: name.to_string(),
                missing: vec![RequiredFile::Env.to_string()],
            })?;

        let declared = read_declared_ports(&env_file).await?;
        let checks = self.ports.check_ports(&declared).await?;
        let conflicts: Vec<&PortCheckResult> = checks.iter().filter(|c| !c.available).collect();

        let mut port_report = PortReport {
            layer,
            entry: name.to_string(),
            checks: Vec::new(),
            rewritten: BTreeMap::new(),
            report: OperationReport::success(format!(
                "all {} declared port(s) of {} are free",
                declared.len(),
                name
            )),
        };

        if conflicts.is_empty() {
            port_report.checks = checks;
            return Ok(port_report);
        }

        let messages: Vec<String> = conflicts.iter().filter_map(|c| c.conflict_message()).collect();
        let stop_hints: Vec<String> = conflicts
            .iter()
            .filter_map(|c| c.occupying_process.as_ref())
            .map(|p| p.stop_command.clone())
            .collect();

        if !fix {
            port_report.report = OperationReport::failure(messages.join("\n"))
                .with_hints(stop_hints)
                .with_hint(format!("deck ports --fix --layer {} {}", layer, name));
            port_report.checks = checks;
            return Ok(port_report);
        }

        match layer {
            Layer::Custom => {}
            Layer::Images => return Err(DeckError::PermissionViolation(env_file)),
            Layer::Templates => {
                port_report.report = OperationReport::failure(format!(
                    "templates are overwritten on sync; copy {} to custom before changing its ports",
                    name
                ))
                .with_hint(format!("deck custom new {}", name));
                port_report.checks = checks;
                return Ok(port_report);
            }
        }

        let rewritten: BTreeMap<String, u16> = PortResolver::allocations(&checks)?
            .into_iter()
            .filter(|a| a.was_substituted())
            .map(|a| (a.port_type, a.resolved_port))
            .collect();
        rewrite_env_ports(&env_file, &rewritten).await?;
        tracing::info!("rewrote {} port(s) in {}", rewritten.len(), env_file.display());

        let changes: Vec<String> = rewritten
            .iter()
            .map(|(key, port)| format!("{}={}", key, port))
            .collect();
        port_report.report = OperationReport::success(format!(
            "updated {}: {}",
            env_file.display(),
            changes.join(", ")
        ));
        port_report.rewritten = rewritten;
        port_report.checks = checks;
        Ok(port_report)
    }

    /// Lets the user pick an entry of `layer`. `None` if the layer is empty or nothing was
    /// picked.
    pub async fn select_entry(&self, layer: Layer, selector: &dyn Selector) -> DeckResult<Option<String>> {
        let entries = self.directories.list_entries(layer).await?;
        if entries.is_empty() {
            tracing::info!("no {} entries under {}", layer, DECK_DIR);
            return Ok(None);
        }

        let items: Vec<String> = entries
            .iter()
            .map(|e| match e.unavailable_reason() {
                Some(reason) => format!("{} ({})", e.name, reason),
                None => e.name.clone(),
            })
            .collect();

        let picked = selector
            .select_one(&format!("Select a {} entry", layer), &items)
            .await?;
        Ok(picked.and_then(|index| entries.get(index)).map(|e| e.name.clone()))
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl std::fmt::Debug for Deck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deck")
            .field("project_dir", &self.project_dir)
            .field("engine", &self.engine.kind())
            .finish_non_exhaustive()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::{
        engine::FixtureEngine,
        integrations::{FixtureBuildPipeline, NoopTemplateSync},
        ports::{FixturePortProbe, ProcessInfo},
    };

    use super::*;

    fn deck(dir: &Path, probe: FixturePortProbe) -> Deck {
        let engine = Arc::new(FixtureEngine::default());
        Deck::with_parts(
            dir,
            DeckConfig::builder().created_by("alice").build(),
            engine.clone(),
            PortResolver::new(Arc::new(probe)),
            Arc::new(FixtureBuildPipeline::new(engine)),
            Arc::new(NoopTemplateSync),
        )
    }

    fn write_entry(dir: &Path, layer: Layer, name: &str, env: &str) {
        let path = dir.join(DECK_DIR).join(layer.subdir()).join(name);
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join(".env"), env).unwrap();
        std::fs::write(path.join("compose.yml"), "services: {}\n").unwrap();
        std::fs::write(path.join("Dockerfile"), "FROM node:20\n").unwrap();
    }

    #[tokio::test]
    async fn test_update_templates_requires_repo() {
        let dir = tempfile::tempdir().unwrap();
        let deck = deck(dir.path(), FixturePortProbe::default());
        let err = deck
            .update_templates(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DeckError::TemplateRepoNotConfigured));
    }

    #[tokio::test]
    async fn test_promote_template_then_custom() {
        let dir = tempfile::tempdir().unwrap();
        write_entry(dir.path(), Layer::Templates, "nodejs", "DEV_PORT=5000\n");
        let deck = deck(dir.path(), FixturePortProbe::default());

        let custom = deck.promote(Layer::Templates, "nodejs").await.unwrap();
        assert_eq!(custom.name, "nodejs");
        assert_eq!(custom.layer, Layer::Custom);

        let image = deck.promote(Layer::Custom, "nodejs").await.unwrap();
        assert!(image.name.starts_with("nodejs-"));
        assert_eq!(image.layer, Layer::Images);

        let err = deck.promote(Layer::Images, &image.name).await.unwrap_err();
        assert!(matches!(err, DeckError::InvalidPromotion { .. }));
    }

    #[tokio::test]
    async fn test_check_ports_fix_rewrites_custom_env() {
        let dir = tempfile::tempdir().unwrap();
        write_entry(
            dir.path(),
            Layer::Custom,
            "api",
            "# api\nDEV_PORT=5000\nDEBUG_PORT=9229\nNAME=api\n",
        );
        let probe = FixturePortProbe::default().occupy(5000, Some(ProcessInfo::new(1234, "node")));
        let deck = deck(dir.path(), probe);

        let report = deck.check_ports(Layer::Custom, "api", false).await.unwrap();
        assert!(!report.report.success);
        assert!(report.report.message.contains("PID 1234"));
        assert!(report.rewritten.is_empty());

        let report = deck.check_ports(Layer::Custom, "api", true).await.unwrap();
        assert!(report.report.success);
        assert_eq!(report.rewritten.get("DEV_PORT"), Some(&5001));

        let env = std::fs::read_to_string(
            dir.path().join(DECK_DIR).join("custom").join("api").join(".env"),
        )
        .unwrap();
        assert_eq!(env, "# api\nDEV_PORT=5001\nDEBUG_PORT=9229\nNAME=api\n");
    }

    #[tokio::test]
    async fn test_check_ports_fix_refuses_images() {
        let dir = tempfile::tempdir().unwrap();
        write_entry(dir.path(), Layer::Images, "api-20250121-1430", "DEV_PORT=5000\n");
        let probe = FixturePortProbe::default().occupy(5000, None);
        let deck = deck(dir.path(), probe);

        let err = deck
            .check_ports(Layer::Images, "api-20250121-1430", true)
            .await
            .unwrap_err();
        assert!(matches!(err, DeckError::PermissionViolation(_)));
    }

    #[tokio::test]
    async fn test_select_entry_maps_index_to_name() {
        struct Second;

        #[async_trait::async_trait]
        impl Selector for Second {
            async fn select_one(&self, _prompt: &str, items: &[String]) -> DeckResult<Option<usize>> {
                Ok((items.len() > 1).then_some(1))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        write_entry(dir.path(), Layer::Custom, "api", "DEV_PORT=5000\n");
        write_entry(dir.path(), Layer::Custom, "web", "WEB_PORT=8080\n");
        let deck = deck(dir.path(), FixturePortProbe::default());

        let picked = deck.select_entry(Layer::Custom, &Second).await.unwrap();
        assert_eq!(picked.as_deref(), Some("web"));
        assert_eq!(deck.select_entry(Layer::Images, &Second).await.unwrap(), None);
    }
}
