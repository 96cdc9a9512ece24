use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::{DeckError, DeckResult};

use super::{
    repository_name, ContainerEngine, ContainerRecord, ContainerStatus, EngineKind, ExecOutput,
    ImageRecord, RunSpec,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// An in-memory [`ContainerEngine`].
///
/// Holds containers and images in memory, records every call in order, and can be told to
/// fail specific calls. Image removal fails while a container still uses the image, the same
/// way real engines refuse it.
#[derive(Debug)]
pub struct FixtureEngine {
    kind: EngineKind,
    state: Mutex<FixtureState>,
}

/// A call made against a [`FixtureEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EngineCall {
    /// `ps`
    ListContainers,

    /// `images`
    ListImages,

    /// `start <name>`
    Start(String),

    /// `stop <name>`
    Stop(String),

    /// `restart <name>`
    Restart(String),

    /// `unpause <name>`
    Unpause(String),

    /// `rm <name>`
    RemoveContainer(String),

    /// `rmi <reference>`
    RemoveImage(String),

    /// `run --name <name> <image>`
    Run(String),

    /// `exec <name> ...`
    Exec(String),

    /// `logs <name>`
    Logs(String),

    /// `builder prune` / `image prune`
    PruneBuildCache,
}

#[derive(Debug, Default)]
struct FixtureState {
    containers: Vec<ContainerRecord>,
    images: Vec<ImageRecord>,
    calls: Vec<EngineCall>,
    failures: HashMap<EngineCall, String>,
    logs: HashMap<String, String>,
    exec_output: Option<ExecOutput>,
    cancel_after: HashMap<EngineCall, CancellationToken>,
    next_id: usize,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl FixtureEngine {
    /// Creates an empty engine reporting itself as `kind`.
    pub fn new(kind: EngineKind) -> Self {
        Self {
            kind,
            state: Mutex::new(FixtureState::default()),
        }
    }

    /// Adds a container.
    pub fn with_container(self, container: ContainerRecord) -> Self {
        self.add_container(container);
        self
    }

    /// Adds an image.
    pub fn with_image(self, image: ImageRecord) -> Self {
        self.add_image(image);
        self
    }

    /// Adds a container.
    pub fn add_container(&self, container: ContainerRecord) {
        self.state().containers.push(container);
    }

    /// Adds an image.
    pub fn add_image(&self, image: ImageRecord) {
        self.state().images.push(image);
    }

    /// Makes `call` fail with `diagnostic` every time it is made.
    pub fn fail_on(&self, call: EngineCall, diagnostic: impl Into<String>) {
        self.state().failures.insert(call, diagnostic.into());
    }

    /// Cancels `cancel` as soon as `call` has gone through, before the caller sees the result.
    pub fn cancel_after(&self, call: EngineCall, cancel: CancellationToken) {
        self.state().cancel_after.insert(call, cancel);
    }

    /// Sets what `logs` returns for a container.
    pub fn set_logs(&self, name: impl Into<String>, logs: impl Into<String>) {
        self.state().logs.insert(name.into(), logs.into());
    }

    /// Sets what `exec` returns.
    pub fn set_exec_output(&self, output: ExecOutput) {
        self.state().exec_output = Some(output);
    }

    /// A snapshot of the containers.
    pub fn containers(&self) -> Vec<ContainerRecord> {
        self.state().containers.clone()
    }

    /// A snapshot of the images.
    pub fn images(&self) -> Vec<ImageRecord> {
        self.state().images.clone()
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.state().calls.clone()
    }

    /// Calls that changed engine state, in order.
    pub fn mutating_calls(&self) -> Vec<EngineCall> {
        self.calls()
            .into_iter()
            .filter(|call| {
                !matches!(
                    call,
                    EngineCall::ListContainers
                        | EngineCall::ListImages
                        | EngineCall::Logs(_)
                        | EngineCall::Exec(_)
                )
            })
            .collect()
    }

    /// Forgets the recorded calls.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    fn state(&self) -> MutexGuard<'_, FixtureState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records `call` and returns the injected failure for it, if any.
    fn record(&self, state: &mut FixtureState, call: EngineCall, args: &[&str]) -> DeckResult<()> {
        state.calls.push(call.clone());
        match state.failures.get(&call) {
            Some(diagnostic) => Err(self.error(args, diagnostic.clone())),
            None => Ok(()),
        }
    }

    async fn finish(&self, call: &EngineCall) {
        let cancel = self.state().cancel_after.get(call).cloned();
        if let Some(cancel) = cancel {
            cancel.cancel();
            tokio::task::yield_now().await;
        }
    }

    fn error(&self, args: &[&str], diagnostic: impl Into<String>) -> DeckError {
        DeckError::Engine {
            command: self.kind.command_hint(args),
            exit_code: Some(125),
            diagnostic: diagnostic.into(),
        }
    }

    fn transition(
        &self,
        call: EngineCall,
        args: &[&str],
        name: &str,
        allowed: &[ContainerStatus],
        next: ContainerStatus,
    ) -> DeckResult<()> {
        let mut state = self.state();
        self.record(&mut state, call, args)?;

        let container = state
            .containers
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| self.error(args, format!("no such container: {}", name)))?;

        if !allowed.contains(&container.status) {
            return Err(self.error(
                args,
                format!("container {} is {}", name, container.status),
            ));
        }

        container.status = next;
        Ok(())
    }
}

impl FixtureState {
    fn image_matching(&self, reference: &str) -> Option<usize> {
        self.images.iter().position(|image| {
            image.id == reference
                || image.references.iter().any(|r| r == reference)
                || image.reference_named(repository_name(reference)).is_some()
        })
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for FixtureEngine {
    fn default() -> Self {
        Self::new(EngineKind::Podman)
    }
}

#[async_trait]
impl ContainerEngine for FixtureEngine {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    async fn list_containers(&self) -> DeckResult<Vec<ContainerRecord>> {
        let mut state = self.state();
        self.record(&mut state, EngineCall::ListContainers, &["ps", "--all"])?;
        Ok(state.containers.clone())
    }

    async fn list_images(&self) -> DeckResult<Vec<ImageRecord>> {
        let mut state = self.state();
        self.record(&mut state, EngineCall::ListImages, &["images"])?;
        Ok(state.images.clone())
    }

    async fn start_container(&self, name: &str) -> DeckResult<()> {
        use ContainerStatus::*;
        self.transition(
            EngineCall::Start(name.to_string()),
            &["start", name],
            name,
            &[Created, Stopped, Running],
            Running,
        )
    }

    async fn stop_container(&self, name: &str, _timeout_secs: u32) -> DeckResult<()> {
        use ContainerStatus::*;
        self.transition(
            EngineCall::Stop(name.to_string()),
            &["stop", name],
            name,
            &[Running, Paused, Restarting, Stopped, Created],
            Stopped,
        )
    }

    async fn restart_container(&self, name: &str) -> DeckResult<()> {
        use ContainerStatus::*;
        self.transition(
            EngineCall::Restart(name.to_string()),
            &["restart", name],
            name,
            &[Created, Running, Stopped, Paused],
            Running,
        )
    }

    async fn unpause_container(&self, name: &str) -> DeckResult<()> {
        use ContainerStatus::*;
        self.transition(
            EngineCall::Unpause(name.to_string()),
            &["unpause", name],
            name,
            &[Paused],
            Running,
        )
    }

    async fn remove_container(&self, name: &str, force: bool) -> DeckResult<()> {
        let call = EngineCall::RemoveContainer(name.to_string());
        {
            let args = ["rm", name];
            let mut state = self.state();
            self.record(&mut state, call.clone(), &args)?;

            let index = state
                .containers
                .iter()
                .position(|c| c.name == name)
                .ok_or_else(|| self.error(&args, format!("no such container: {}", name)))?;

            if state.containers[index].status.is_running() && !force {
                return Err(self.error(
                    &args,
                    format!("cannot remove running container {}", name),
                ));
            }

            state.containers.remove(index);
        }

        self.finish(&call).await;
        Ok(())
    }

    async fn remove_image(&self, reference: &str, force: bool) -> DeckResult<()> {
        let call = EngineCall::RemoveImage(reference.to_string());
        {
            let args = ["rmi", reference];
            let mut state = self.state();
            self.record(&mut state, call.clone(), &args)?;

            let index = state
                .image_matching(reference)
                .ok_or_else(|| self.error(&args, format!("no such image: {}", reference)))?;

            let image_name = repository_name(reference).to_string();
            let in_use = state
                .containers
                .iter()
                .find(|c| repository_name(&c.image_ref) == image_name);
            if let (Some(container), false) = (in_use, force) {
                return Err(self.error(
                    &args,
                    format!(
                        "image used by container {}: image is in use by a container",
                        container.name
                    ),
                ));
            }

            state.images.remove(index);
        }

        self.finish(&call).await;
        Ok(())
    }

    async fn run_container(&self, spec: &RunSpec) -> DeckResult<String> {
        let args = ["run", "--detach", "--name", spec.name.as_str(), spec.image.as_str()];
        let mut state = self.state();
        self.record(&mut state, EngineCall::Run(spec.name.clone()), &args)?;

        if state.containers.iter().any(|c| c.name == spec.name) {
            return Err(self.error(
                &args,
                format!("the container name {} is already in use", spec.name),
            ));
        }

        let image_ref = state
            .image_matching(&spec.image)
            .map(|index| state.images[index].display_ref().to_string())
            .ok_or_else(|| self.error(&args, format!("{}: image not known", spec.image)))?;

        state.next_id += 1;
        let id = format!("fixture{:04}", state.next_id);
        state.containers.push(ContainerRecord {
            id: id.clone(),
            name: spec.name.clone(),
            status: ContainerStatus::Running,
            image_ref,
            ports: spec
                .ports
                .iter()
                .map(|p| format!("{}->{}/tcp", p.get_host(), p.get_container()))
                .collect(),
            created: Some(Utc::now()),
        });

        Ok(id)
    }

    async fn exec(&self, name: &str, command: &[String], _interactive: bool) -> DeckResult<ExecOutput> {
        let args = ["exec", name];
        let mut state = self.state();
        self.record(&mut state, EngineCall::Exec(name.to_string()), &args)?;

        let running = state
            .containers
            .iter()
            .any(|c| c.name == name && c.status.is_running());
        if !running {
            return Err(self.error(&args, format!("container {} is not running", name)));
        }

        Ok(state.exec_output.clone().unwrap_or_else(|| ExecOutput {
            exit_code: 0,
            stdout: command.join(" "),
            stderr: String::new(),
        }))
    }

    async fn logs(&self, name: &str, tail: Option<usize>) -> DeckResult<String> {
        let args = ["logs", name];
        let mut state = self.state();
        self.record(&mut state, EngineCall::Logs(name.to_string()), &args)?;

        if !state.containers.iter().any(|c| c.name == name) {
            return Err(self.error(&args, format!("no such container: {}", name)));
        }

        let logs = state.logs.get(name).cloned().unwrap_or_default();
        Ok(match tail {
            Some(n) => {
                let lines: Vec<&str> = logs.lines().collect();
                let start = lines.len().saturating_sub(n);
                lines[start..].join("\n")
            }
            None => logs,
        })
    }

    async fn prune_build_cache(&self) -> DeckResult<()> {
        self.record(&mut self.state(), EngineCall::PruneBuildCache, &["builder", "prune"])?;
        self.finish(&EngineCall::PruneBuildCache).await;
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
