use std::{collections::BTreeMap, sync::Arc};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    config::{DeckConfig, PortPair},
    engine::{ContainerEngine, ContainerRecord, ContainerStatus, ExecOutput, RunSpec},
    integrations::BuildPipeline,
    ports::{PortCheckResult, PortResolver},
    report::OperationReport,
    resources::{BuildStatus, DirectoryManager, Layer, ResourceEntry},
    utils::{cancellable, read_declared_ports},
    DeckError, DeckResult,
};

use super::{decide, find_entry_container, find_entry_image, ProgressEvent, ProgressSink, StartAction};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Brings the container of an Images entry up, whatever state it is in.
///
/// ```text
/// container running           -> attach
/// container stopped/created   -> check ports -> start
/// container paused            -> unpause
/// no container, image exists  -> check ports -> run {entry}-dev
/// neither                     -> build -> check ports -> run {entry}-dev
/// dead/removing/restarting    -> refuse, with a command to fix it
/// ```
///
/// Nothing is retried. A failed step ends the run and is reported in the [`StartOutcome`].
pub struct SmartStarter {
    engine: Arc<dyn ContainerEngine>,
    directories: DirectoryManager,
    ports: PortResolver,
    builder: Arc<dyn BuildPipeline>,
    config: DeckConfig,
}

/// What a smart start did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartOutcome {
    /// The decision that was taken.
    pub action: StartAction,

    /// The container that was attached to, started or created.
    pub container: Option<String>,

    /// The port checks made before starting.
    pub port_checks: Vec<PortCheckResult>,

    /// The user-facing report.
    pub report: OperationReport,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SmartStarter {
    /// Creates a starter.
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        directories: DirectoryManager,
        ports: PortResolver,
        builder: Arc<dyn BuildPipeline>,
        config: DeckConfig,
    ) -> Self {
        Self {
            engine,
            directories,
            ports,
            builder,
            config,
        }
    }

    /// Smart-starts the Images entry `name`.
    ///
    /// ## Errors
    /// Only a missing entry or a failure to query the engine is an error. Anything that goes
    /// wrong while acting on the decision is reported in the returned outcome.
    pub async fn smart_start(
        &self,
        name: &str,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> DeckResult<StartOutcome> {
        let entry = self.directories.entry(Layer::Images, name).await?;

        let (containers, images) = cancellable(cancel, "looking up containers", async {
            tokio::try_join!(self.engine.list_containers(), self.engine.list_images())
        })
        .await?;

        let container = find_entry_container(name, self.config.get_default_env(), &containers);
        let image = find_entry_image(name, &images);
        let action = decide(self.engine.kind(), container, image, name);
        let total = action.total_steps();
        tracing::info!("smart start of {}: {}", name, action.label());

        progress.emit(ProgressEvent::new(
            1,
            total,
            format!("looking up containers for {}", name),
        ));

        let outcome = match &action {
            StartAction::Attach { container } => Ok(self.attach(&action, container, progress)),
            StartAction::Restart { container: target } => {
                let record = container.cloned();
                self.restart_stopped(&action, &entry, target, record.as_ref(), progress, cancel)
                    .await
            }
            StartAction::Unpause { container } => self.unpause(&action, &entry, container, progress, cancel).await,
            StartAction::Create { image_ref } => {
                self.create(&action, &entry, image_ref, 2, progress, cancel)
                    .await
            }
            StartAction::Rebuild => self.rebuild(&action, &entry, progress, cancel).await,
            StartAction::Refuse {
                container,
                status,
                hint,
            } => Ok(StartOutcome {
                action: action.clone(),
                container: Some(container.clone()),
                port_checks: Vec::new(),
                report: OperationReport::failure(format!(
                    "container {} is {}; deck won't start it",
                    container, status
                ))
                .with_hint(hint.clone()),
            }),
        };

        Ok(outcome.unwrap_or_else(|error| self.failed(&action, error)))
    }

    /// Stops the container of an entry.
    pub async fn stop(&self, name: &str, cancel: &CancellationToken) -> DeckResult<OperationReport> {
        let container = self.entry_container(name).await?;
        let hint = self.engine.kind().command_hint(&["stop", &container.name]);

        if !matches!(
            container.status,
            ContainerStatus::Running | ContainerStatus::Paused | ContainerStatus::Restarting
        ) {
            return Ok(OperationReport::success(format!(
                "container {} is already {}",
                container.name, container.status
            )));
        }

        let stopping = format!("stopping {}", container.name);
        let result = cancellable(
            cancel,
            &stopping,
            self.engine
                .stop_container(&container.name, *self.config.get_stop_timeout_secs()),
        )
        .await;

        Ok(match result {
            Ok(()) => OperationReport::success(format!("stopped {}", container.name)).with_hint(hint),
            Err(e) => OperationReport::failure(e.to_string()).with_hint(hint),
        })
    }

    /// Restarts the container of an entry.
    ///
    /// A running container is restarted in place. Anything else goes through
    /// [`smart_start`](Self::smart_start).
    pub async fn restart(
        &self,
        name: &str,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> DeckResult<StartOutcome> {
        let containers = self.engine.list_containers().await?;
        let running = find_entry_container(name, self.config.get_default_env(), &containers)
            .filter(|c| c.status.is_running())
            .cloned();

        let Some(container) = running else {
            return self.smart_start(name, progress, cancel).await;
        };

        let action = StartAction::Restart {
            container: container.name.clone(),
        };
        progress.emit(ProgressEvent::new(1, 1, format!("restarting {}", container.name)));

        let restarting = format!("restarting {}", container.name);
        let hint = self.engine.kind().command_hint(&["restart", &container.name]);
        match cancellable(cancel, &restarting, self.engine.restart_container(&container.name)).await {
            Ok(()) => {
                self.record_start(name).await;
                Ok(StartOutcome {
                    action,
                    container: Some(container.name.clone()),
                    port_checks: Vec::new(),
                    report: OperationReport::success(format!("restarted {}", container.name))
                        .with_hint(hint),
                })
            }
            Err(e) => Ok(self.failed(&action, e)),
        }
    }

    /// Fetches the logs of an entry's container.
    pub async fn logs(&self, name: &str, tail: Option<usize>) -> DeckResult<String> {
        let container = self.entry_container(name).await?;
        self.engine.logs(&container.name, tail).await
    }

    /// Runs a command in an entry's running container.
    pub async fn exec(&self, name: &str, command: &[String], interactive: bool) -> DeckResult<ExecOutput> {
        let container = self.entry_container(name).await?;
        if !container.status.is_running() {
            return Err(DeckError::Engine {
                command: self.engine.kind().command_hint(&["exec", &container.name]),
                exit_code: None,
                diagnostic: format!("container {} is {}, not running", container.name, container.status),
            });
        }

        self.engine.exec(&container.name, command, interactive).await
    }

    fn attach(&self, action: &StartAction, container: &str, progress: &dyn ProgressSink) -> StartOutcome {
        progress.emit(ProgressEvent::new(2, 2, format!("attaching to running container {}", container)));

        StartOutcome {
            action: action.clone(),
            container: Some(container.to_string()),
            port_checks: Vec::new(),
            report: OperationReport::success(format!("container {} is already running", container))
                .with_hint(
                    self.engine
                        .kind()
                        .command_hint(&["exec", "--interactive", "--tty", container, "sh"]),
                ),
        }
    }

    async fn restart_stopped(
        &self,
        action: &StartAction,
        entry: &ResourceEntry,
        container: &str,
        record: Option<&ContainerRecord>,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> DeckResult<StartOutcome> {
        progress.emit(ProgressEvent::new(2, 3, "checking ports"));
        let mut declared = self.declared_ports(entry).await?;
        if let Some(record) = record {
            apply_published_ports(&mut declared, record);
        }

        let checks = self.ports.check_ports(&declared).await?;
        if let Some(outcome) = self.port_conflicts(action, container, &checks) {
            return Ok(outcome);
        }

        progress.emit(ProgressEvent::new(3, 3, format!("starting container {}", container)));
        let starting = format!("starting {}", container);
        cancellable(cancel, &starting, self.engine.start_container(container)).await?;
        self.record_start(&entry.name).await;

        Ok(StartOutcome {
            action: action.clone(),
            container: Some(container.to_string()),
            port_checks: checks,
            report: OperationReport::success(format!("started container {}", container))
                .with_hint(self.engine.kind().command_hint(&["start", container])),
        })
    }

    async fn unpause(
        &self,
        action: &StartAction,
        entry: &ResourceEntry,
        container: &str,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> DeckResult<StartOutcome> {
        // A paused container still holds its ports, so there is nothing to check.
        progress.emit(ProgressEvent::new(2, 2, format!("resuming container {}", container)));
        let resuming = format!("resuming {}", container);
        cancellable(cancel, &resuming, self.engine.unpause_container(container)).await?;
        self.record_start(&entry.name).await;

        Ok(StartOutcome {
            action: action.clone(),
            container: Some(container.to_string()),
            port_checks: Vec::new(),
            report: OperationReport::success(format!("resumed container {}", container))
                .with_hint(self.engine.kind().command_hint(&["unpause", container])),
        })
    }

    async fn create(
        &self,
        action: &StartAction,
        entry: &ResourceEntry,
        image_ref: &str,
        first_step: usize,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> DeckResult<StartOutcome> {
        let total = action.total_steps();
        let container = format!("{}-{}", entry.name, self.config.get_default_env());

        progress.emit(ProgressEvent::new(first_step, total, "checking ports"));
        let declared = self.declared_ports(entry).await?;
        let checks = self.ports.check_ports(&declared).await?;
        let allocations = PortResolver::allocations(&checks)?;

        let mut hints = Vec::new();
        for allocation in allocations.iter().filter(|a| a.was_substituted()) {
            tracing::info!(
                "publishing {} on host port {} instead of {}",
                allocation.port_type,
                allocation.resolved_port,
                allocation.requested_port
            );
            hints.push(format!(
                "{} {} is taken, published on host port {}",
                allocation.port_type, allocation.requested_port, allocation.resolved_port
            ));
        }

        let spec = RunSpec {
            name: container.clone(),
            image: image_ref.to_string(),
            ports: allocations
                .iter()
                .map(|a| PortPair::with_distinct(a.resolved_port, a.requested_port))
                .collect(),
            env_file: entry.env_file().map(|path| path.to_path_buf()),
        };

        progress.emit(ProgressEvent::new(
            first_step + 1,
            total,
            format!("creating container {} from {}", container, image_ref),
        ));
        let creating = format!("creating {}", container);
        cancellable(cancel, &creating, self.engine.run_container(&spec)).await?;

        progress.emit(ProgressEvent::new(
            first_step + 2,
            total,
            format!("waiting for {} to run", container),
        ));
        let status = self
            .engine
            .inspect_container(&container)
            .await?
            .map(|record| record.status)
            .unwrap_or(ContainerStatus::NotExists);

        let mut run_hint = vec!["run", "--detach", "--name", container.as_str()];
        run_hint.push(image_ref);
        hints.push(self.engine.kind().command_hint(&run_hint));

        if !status.is_running() {
            hints.push(self.engine.kind().command_hint(&["logs", &container]));
            return Ok(StartOutcome {
                action: action.clone(),
                container: Some(container.clone()),
                port_checks: checks,
                report: OperationReport::failure(format!(
                    "container {} was created but is {}",
                    container, status
                ))
                .with_hints(hints),
            });
        }

        self.record_start(&entry.name).await;
        Ok(StartOutcome {
            action: action.clone(),
            container: Some(container.clone()),
            port_checks: checks,
            report: OperationReport::success(format!("container {} is running", container))
                .with_hints(hints),
        })
    }

    async fn rebuild(
        &self,
        action: &StartAction,
        entry: &ResourceEntry,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> DeckResult<StartOutcome> {
        let total = action.total_steps();
        let Some(compose_path) = entry.compose_file() else {
            return Err(DeckError::ResourceIncomplete {
                name: entry.name.clone(),
                missing: entry.missing_files.iter().map(|f| f.to_string()).collect(),
            });
        };

        progress.emit(ProgressEvent::new(2, total, format!("building image {}", entry.name)));
        self.set_build_status(&entry.name, BuildStatus::Building).await;

        let building = format!("building {}", entry.name);
        let built = cancellable(cancel, &building, self.builder.build(compose_path, &entry.name)).await;
        if let Err(e) = built {
            self.set_build_status(&entry.name, BuildStatus::Failed).await;
            return Err(e);
        }
        self.set_build_status(&entry.name, BuildStatus::Built).await;

        let images = self.engine.list_images().await?;
        let image_ref = find_entry_image(&entry.name, &images)
            .and_then(|image| image.reference_named(&entry.name))
            .map(String::from)
            .ok_or_else(|| DeckError::BuildFailed {
                image: entry.name.clone(),
                diagnostic: "the build finished but the engine has no image with that name".to_string(),
            })?;

        self.create(action, entry, &image_ref, 3, progress, cancel).await
    }

    fn port_conflicts(
        &self,
        action: &StartAction,
        container: &str,
        checks: &[PortCheckResult],
    ) -> Option<StartOutcome> {
        let conflicts: Vec<&PortCheckResult> = checks.iter().filter(|c| !c.available).collect();
        if conflicts.is_empty() {
            return None;
        }

        let mut hints: Vec<String> = conflicts.iter().filter_map(|c| c.conflict_message()).collect();
        hints.extend(
            conflicts
                .iter()
                .filter_map(|c| c.occupying_process.as_ref())
                .map(|p| p.stop_command.clone()),
        );

        let ports: Vec<String> = conflicts.iter().map(|c| c.port.to_string()).collect();
        Some(StartOutcome {
            action: action.clone(),
            container: Some(container.to_string()),
            port_checks: checks.to_vec(),
            report: OperationReport::failure(format!(
                "cannot start {}: port {} already in use",
                container,
                ports.join(", ")
            ))
            .with_hints(hints),
        })
    }

    fn failed(&self, action: &StartAction, error: DeckError) -> StartOutcome {
        tracing::error!("smart start failed: {}", error);
        let mut report = OperationReport::failure(error.to_string());
        if let DeckError::Engine { command, .. } = &error {
            report = report.with_hint(command.clone());
        }

        StartOutcome {
            action: action.clone(),
            container: None,
            port_checks: Vec::new(),
            report,
        }
    }

    async fn declared_ports(&self, entry: &ResourceEntry) -> DeckResult<BTreeMap<String, u16>> {
        match entry.env_file() {
            Some(env_file) => read_declared_ports(env_file).await,
            None => Ok(BTreeMap::new()),
        }
    }

    async fn entry_container(&self, name: &str) -> DeckResult<ContainerRecord> {
        let containers = self.engine.list_containers().await?;
        find_entry_container(name, self.config.get_default_env(), &containers)
            .cloned()
            .ok_or_else(|| DeckError::ContainerNotFound(name.to_string()))
    }

    async fn record_start(&self, name: &str) {
        let now = Utc::now();
        if let Err(e) = self
            .directories
            .update_metadata(name, |m| m.set_last_started(now))
            .await
        {
            tracing::warn!("failed to record start of {}: {}", name, e);
        }
    }

    async fn set_build_status(&self, name: &str, status: BuildStatus) {
        if let Err(e) = self
            .directories
            .update_metadata(name, |m| m.set_build_status(status))
            .await
        {
            tracing::warn!("failed to record build status of {}: {}", name, e);
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

/// Replaces declared ports with the host ports the container actually publishes.
///
/// A container created while a declared port was taken publishes a substitute; restarting it
/// needs that substitute free, not the declared port.
fn apply_published_ports(declared: &mut BTreeMap<String, u16>, container: &ContainerRecord) {
    let published: Vec<(u16, u16)> = container
        .ports
        .iter()
        .filter_map(|port| parse_published_port(port))
        .collect();

    for port in declared.values_mut() {
        if let Some((host, _)) = published.iter().find(|(_, inner)| inner == port) {
            *port = *host;
        }
    }
}

/// Parses `0.0.0.0:5001->5000/tcp` or `5001->5000/tcp` into `(host, container)`.
fn parse_published_port(port: &str) -> Option<(u16, u16)> {
    let (host, container) = port.split_once("->")?;
    let host = host.rsplit(':').next()?.parse().ok()?;
    let container = container.split('/').next()?.parse().ok()?;
    Some((host, container))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
