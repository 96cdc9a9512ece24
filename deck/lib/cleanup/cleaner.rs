use std::{fmt, sync::Arc};

use tokio_util::sync::CancellationToken;

use crate::{
    catalog::NameMatcher,
    config::DeckConfig,
    engine::{ContainerEngine, ContainerRecord, EngineKind},
    integrations::Confirm,
    resources::{DirectoryManager, Layer},
    DeckError, DeckResult,
};

use super::{CleaningKind, CleaningOption, CleaningPlan, CleaningResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Computes and carries out cleanups.
///
/// Steps run strictly in order: containers, image, directory, build cache. A step is skipped
/// when one it depends on failed. The cancellation token is checked between steps: a step
/// already issued finishes and is reported, everything after it is skipped.
pub struct CleanupEngine {
    engine: Arc<dyn ContainerEngine>,
    directories: DirectoryManager,
    config: DeckConfig,
}

/// What a cleanup would delete, computed from fresh engine data.
#[derive(Debug, Clone, Default)]
struct Targets {
    containers: Vec<String>,
    image_ref: Option<String>,
    production_container: Option<String>,
}

/// A single deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Container(String),
    Image(String),
    Directory,
    BuildCache,
}

/// Accumulates step outcomes.
#[derive(Debug, Default)]
struct Ledger {
    cleaned: Vec<String>,
    skipped: Vec<String>,
    hints: Vec<String>,
    cancelled: bool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl CleanupEngine {
    /// Creates a cleanup engine.
    pub fn new(engine: Arc<dyn ContainerEngine>, directories: DirectoryManager, config: DeckConfig) -> Self {
        Self {
            engine,
            directories,
            config,
        }
    }

    /// Lists the cleanups available for an entry.
    ///
    /// Templates are never cleaned here. Custom and Images entries with a production container
    /// (`{name}-prod`, `{name}-production`, in any state) are refused outright.
    pub async fn compute_cleaning_options(&self, layer: Layer, name: &str) -> DeckResult<CleaningPlan> {
        if layer == Layer::Templates {
            return Ok(CleaningPlan::Refused {
                reason: format!(
                    "template '{}' is managed by the template repository and can't be cleaned",
                    name
                ),
                production_container: None,
                hints: vec!["deck templates update".to_string()],
            });
        }

        self.directories.entry(layer, name).await?;
        let targets = self.targets(layer, name).await?;

        if let Some(container) = &targets.production_container {
            let error = DeckError::ProductionGuardTriggered {
                resource: name.to_string(),
                container: container.clone(),
            };
            tracing::warn!("{}", error);

            return Ok(CleaningPlan::Refused {
                reason: error.to_string(),
                production_container: Some(container.clone()),
                hints: self.production_hints(container),
            });
        }

        let option = |kind: CleaningKind, recommended: bool| CleaningOption {
            kind,
            layer,
            name: name.to_string(),
            containers: if kind.removes_containers() {
                targets.containers.clone()
            } else {
                Vec::new()
            },
            image_ref: if kind.removes_image() {
                targets.image_ref.clone()
            } else {
                None
            },
            recommended,
        };

        let options = match layer {
            Layer::Custom if targets.containers.is_empty() => {
                vec![option(CleaningKind::DirectoryOnly, true)]
            }
            Layer::Custom => vec![
                option(CleaningKind::DirectoryOnly, true),
                option(CleaningKind::DirectoryAndContainers, false),
            ],
            _ => vec![
                option(CleaningKind::Standard, true),
                option(CleaningKind::WithBuildCache, false),
            ],
        };

        Ok(CleaningPlan::Options(options))
    }

    /// Carries out a cleanup.
    ///
    /// The targets are re-read from the engine first, so containers created since the option
    /// was computed are included and a production container that appeared in the meantime
    /// still stops everything. `confirm` sees the full list before anything is deleted.
    pub async fn execute(
        &self,
        option: &CleaningOption,
        confirm: &dyn Confirm,
        cancel: &CancellationToken,
    ) -> DeckResult<CleaningResult> {
        if option.layer == Layer::Templates {
            return Ok(CleaningResult {
                message: "templates are cleaned with `deck templates update`".to_string(),
                hints: vec!["deck templates update".to_string()],
                refused: true,
                ..Default::default()
            });
        }

        let targets = self.targets(option.layer, &option.name).await?;
        if let Some(container) = &targets.production_container {
            let error = DeckError::ProductionGuardTriggered {
                resource: option.name.clone(),
                container: container.clone(),
            };
            tracing::warn!("{}", error);

            return Ok(CleaningResult {
                message: error.to_string(),
                hints: self.production_hints(container),
                refused: true,
                ..Default::default()
            });
        }

        let mut steps = Vec::new();
        if option.kind.removes_containers() {
            steps.extend(targets.containers.iter().cloned().map(Step::Container));
        }
        if option.kind.removes_image() {
            if let Some(image_ref) = &targets.image_ref {
                steps.push(Step::Image(image_ref.clone()));
            }
        }
        steps.push(Step::Directory);
        if option.kind.prunes_build_cache() {
            steps.push(Step::BuildCache);
        }

        let summary = self.summary(option, &steps);
        if !confirm.confirm(&summary).await? {
            tracing::info!("cleanup of {} declined", option.name);
            return Ok(CleaningResult {
                message: "cleanup declined, nothing was deleted".to_string(),
                skipped_resources: steps
                    .iter()
                    .map(|s| format!("{} (declined)", self.describe(option, s)))
                    .collect(),
                cancelled: true,
                ..Default::default()
            });
        }

        let mut ledger = Ledger::default();
        let mut containers_failed = false;
        let mut image_failed = false;

        for step in &steps {
            let description = self.describe(option, step);
            if ledger.cancelled || cancel.is_cancelled() {
                ledger.cancelled = true;
                ledger.skipped.push(format!("{} (cancelled)", description));
                continue;
            }

            let blocked = match step {
                Step::Container(_) => None,
                Step::Image(_) if containers_failed => Some("a container could not be removed"),
                Step::Directory if containers_failed || image_failed => {
                    Some("an earlier step failed")
                }
                Step::BuildCache if containers_failed || image_failed => {
                    Some("an earlier step failed")
                }
                _ => None,
            };
            if let Some(reason) = blocked {
                ledger.skipped.push(format!("{} ({})", description, reason));
                continue;
            }

            // Issued deletions run to completion; cancellation is only observed between steps.
            tracing::info!("removing {}", description);
            let result = match step {
                Step::Container(name) => self.engine.remove_container(name, true).await,
                Step::Image(reference) => self.engine.remove_image(reference, false).await,
                Step::Directory => self.directories.remove_entry(option.layer, &option.name).await,
                Step::BuildCache => self.engine.prune_build_cache().await,
            };

            match result {
                Ok(()) => ledger.cleaned.push(description),
                Err(e) => {
                    tracing::error!("failed to remove {}: {}", description, e);
                    match step {
                        Step::Container(_) => containers_failed = true,
                        Step::Image(_) => image_failed = true,
                        _ => {}
                    }
                    if let Some(hint) = self.retry_hint(step) {
                        ledger.hints.push(hint);
                    }
                    ledger.skipped.push(format!("{} ({})", description, e));
                }
            }
        }

        Ok(ledger.finish(&option.name))
    }

    /// Reads what a cleanup of the entry would touch.
    async fn targets(&self, layer: Layer, name: &str) -> DeckResult<Targets> {
        let (entries, images, containers) = tokio::try_join!(
            self.directories.list_entries(layer),
            self.engine.list_images(),
            self.engine.list_containers(),
        )?;

        let suffixes = self.config.get_env_suffixes();
        let matcher = NameMatcher::new(suffixes, entries.iter().map(|e| e.name.as_str()));
        let related = matcher.containers(name, &containers);

        let production_container = self.production_container(name, &containers).or_else(|| {
            related
                .iter()
                .find(|c| self.is_production_name(&c.name))
                .map(|c| c.name.clone())
        });

        let image_ref = match layer {
            Layer::Images => matcher.image(name, &images).map(String::from),
            _ => None,
        };

        Ok(Targets {
            containers: related.into_iter().map(|c| c.name.clone()).collect(),
            image_ref,
            production_container,
        })
    }

    /// Finds a `{name}-{production suffix}` container, whatever its state.
    fn production_container(&self, name: &str, containers: &[ContainerRecord]) -> Option<String> {
        self.config.get_production_suffixes().iter().find_map(|suffix| {
            let production = format!("{}-{}", name, suffix);
            containers
                .iter()
                .find(|c| c.name == production)
                .map(|c| c.name.clone())
        })
    }

    fn is_production_name(&self, container: &str) -> bool {
        self.config
            .get_production_suffixes()
            .iter()
            .any(|suffix| container.ends_with(&format!("-{}", suffix)))
    }

    fn production_hints(&self, container: &str) -> Vec<String> {
        let kind = self.engine.kind();
        let filter = format!("name={}", container);
        vec![
            kind.command_hint(&["ps", "--all", "--filter", &filter]),
            kind.command_hint(&["inspect", container]),
        ]
    }

    fn retry_hint(&self, step: &Step) -> Option<String> {
        let kind = self.engine.kind();
        match step {
            Step::Container(name) => Some(kind.command_hint(&["rm", "--force", name])),
            Step::Image(reference) => Some(kind.command_hint(&["rmi", reference])),
            Step::BuildCache => Some(match kind {
                EngineKind::Docker => kind.command_hint(&["builder", "prune", "--force"]),
                EngineKind::Podman => kind.command_hint(&["image", "prune", "--force"]),
            }),
            Step::Directory => None,
        }
    }

    fn summary(&self, option: &CleaningOption, steps: &[Step]) -> String {
        let mut summary = format!("The following will be deleted for {}:\n", option.name);
        for step in steps {
            summary.push_str(&format!("  - {}\n", self.describe(option, step)));
        }
        if option.kind.prunes_build_cache() {
            summary.push_str("Pruning the build cache makes the next build re-fetch every dependency.\n");
        }
        summary
    }

    fn describe(&self, option: &CleaningOption, step: &Step) -> String {
        match step {
            Step::Container(name) => format!("container {}", name),
            Step::Image(reference) => format!("image {}", reference),
            Step::Directory => format!("directory {}/{}", option.layer, option.name),
            Step::BuildCache => "build cache".to_string(),
        }
    }
}

impl Ledger {
    fn finish(self, name: &str) -> CleaningResult {
        let success = self.skipped.is_empty();
        let message = if success {
            format!("cleaned {} ({} resource(s))", name, self.cleaned.len())
        } else if self.cancelled {
            format!(
                "cleanup of {} cancelled after {} step(s); {} not done",
                name,
                self.cleaned.len(),
                self.skipped.len()
            )
        } else {
            format!(
                "cleanup of {} incomplete: {} cleaned, {} skipped",
                name,
                self.cleaned.len(),
                self.skipped.len()
            )
        };

        CleaningResult {
            success,
            message,
            cleaned_resources: self.cleaned,
            skipped_resources: self.skipped,
            hints: self.hints,
            refused: false,
            cancelled: self.cancelled,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Debug for CleanupEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanupEngine")
            .field("directories", &self.directories)
            .finish_non_exhaustive()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::path::Path;

    use crate::engine::{ContainerStatus, EngineCall, FixtureEngine, ImageRecord};

    use super::*;

    const ENTRY: &str = "api-20250121-1430";

    fn setup(dir: &Path, containers: &[(&str, ContainerStatus)]) -> (Arc<FixtureEngine>, CleanupEngine) {
        let directories = DirectoryManager::new(dir, "alice");
        let entry_dir = directories.entry_path(Layer::Images, ENTRY);
        std::fs::create_dir_all(&entry_dir).unwrap();
        std::fs::write(entry_dir.join(".env"), "DEV_PORT=5000\n").unwrap();

        let engine = FixtureEngine::default().with_image(
            ImageRecord::builder()
                .id("sha256:api")
                .references(vec![format!("localhost/{}:latest", ENTRY)])
                .build(),
        );
        for (name, status) in containers {
            engine.add_container(
                ContainerRecord::builder()
                    .id(*name)
                    .name(*name)
                    .status(*status)
                    .image_ref(format!("localhost/{}:latest", ENTRY))
                    .build(),
            );
        }

        let engine = Arc::new(engine);
        let cleaner = CleanupEngine::new(engine.clone(), directories, DeckConfig::default());
        (engine, cleaner)
    }

    fn standard_option(plan: CleaningPlan) -> CleaningOption {
        match plan {
            CleaningPlan::Options(options) => options
                .into_iter()
                .find(|o| o.kind == CleaningKind::Standard)
                .unwrap(),
            CleaningPlan::Refused { reason, .. } => panic!("refused: {}", reason),
        }
    }

    #[tokio::test]
    async fn test_templates_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let (_, cleaner) = setup(dir.path(), &[]);
        let plan = cleaner
            .compute_cleaning_options(Layer::Templates, "nodejs")
            .await
            .unwrap();
        assert!(matches!(plan, CleaningPlan::Refused { hints, .. } if hints == vec!["deck templates update"]));
    }

    #[tokio::test]
    async fn test_failed_container_blocks_image_removal() {
        let dir = tempfile::tempdir().unwrap();
        let dev = format!("{}-dev", ENTRY);
        let (engine, cleaner) = setup(dir.path(), &[(&dev, ContainerStatus::Running)]);
        engine.fail_on(EngineCall::RemoveContainer(dev.clone()), "device or resource busy");

        let option = standard_option(
            cleaner
                .compute_cleaning_options(Layer::Images, ENTRY)
                .await
                .unwrap(),
        );
        let result = cleaner
            .execute(&option, &|_: &str| true, &CancellationToken::new())
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.cleaned_resources.is_empty());
        assert_eq!(result.skipped_resources.len(), 3);
        assert!(result.skipped_resources[0].contains("device or resource busy"));
        assert!(!engine
            .calls()
            .iter()
            .any(|call| matches!(call, EngineCall::RemoveImage(_))));
        assert!(dir.path().join("images").join(ENTRY).exists());
    }

    #[tokio::test]
    async fn test_declined_confirmation_deletes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let dev = format!("{}-dev", ENTRY);
        let (engine, cleaner) = setup(dir.path(), &[(&dev, ContainerStatus::Stopped)]);

        let option = standard_option(
            cleaner
                .compute_cleaning_options(Layer::Images, ENTRY)
                .await
                .unwrap(),
        );
        engine.clear_calls();

        let result = cleaner
            .execute(&option, &|_: &str| false, &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.cancelled);
        assert!(result.cleaned_resources.is_empty());
        assert!(engine.mutating_calls().is_empty());
        assert_eq!(engine.containers().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_token_skips_everything() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, cleaner) = setup(dir.path(), &[]);
        let option = standard_option(
            cleaner
                .compute_cleaning_options(Layer::Images, ENTRY)
                .await
                .unwrap(),
        );

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = cleaner
            .execute(&option, &|_: &str| true, &cancel)
            .await
            .unwrap();

        assert!(result.cancelled);
        assert!(!result.success);
        assert_eq!(
            result.skipped_resources,
            vec![
                format!("image localhost/{}:latest (cancelled)", ENTRY),
                format!("directory images/{} (cancelled)", ENTRY),
            ]
        );
        assert!(engine.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_removal_reports_finished_step() {
        let dir = tempfile::tempdir().unwrap();
        let dev = format!("{}-dev", ENTRY);
        let test = format!("{}-test", ENTRY);
        let (engine, cleaner) = setup(
            dir.path(),
            &[(dev.as_str(), ContainerStatus::Running), (test.as_str(), ContainerStatus::Stopped)],
        );
        let option = standard_option(
            cleaner
                .compute_cleaning_options(Layer::Images, ENTRY)
                .await
                .unwrap(),
        );

        let cancel = CancellationToken::new();
        engine.cancel_after(EngineCall::RemoveContainer(dev.clone()), cancel.clone());
        let result = cleaner
            .execute(&option, &|_: &str| true, &cancel)
            .await
            .unwrap();

        assert!(result.cancelled);
        assert_eq!(result.cleaned_resources, vec![format!("container {}", dev)]);
        assert_eq!(
            result.skipped_resources,
            vec![
                format!("container {} (cancelled)", test),
                format!("image localhost/{}:latest (cancelled)", ENTRY),
                format!("directory images/{} (cancelled)", ENTRY),
            ]
        );

        let remaining: Vec<_> = engine.containers().into_iter().map(|c| c.name).collect();
        assert_eq!(remaining, vec![test]);
        assert_eq!(engine.images().len(), 1);
    }

    #[tokio::test]
    async fn test_build_cache_option_prunes_last() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, cleaner) = setup(dir.path(), &[]);

        let plan = cleaner
            .compute_cleaning_options(Layer::Images, ENTRY)
            .await
            .unwrap();
        let CleaningPlan::Options(options) = plan else {
            panic!("expected options");
        };
        let with_cache = options
            .iter()
            .find(|o| o.kind == CleaningKind::WithBuildCache)
            .unwrap();
        assert!(!with_cache.recommended);

        let result = cleaner
            .execute(with_cache, &|_: &str| true, &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.cleaned_resources.last().unwrap(), "build cache");
        assert_eq!(engine.mutating_calls().last(), Some(&EngineCall::PruneBuildCache));
    }
}
