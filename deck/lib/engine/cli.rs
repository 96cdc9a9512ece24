use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use tokio::process::Command;

use crate::{DeckError, DeckResult};

use super::{
    ContainerEngine, ContainerRecord, ContainerStatus, EngineKind, ExecOutput, ImageRecord, RunSpec,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A [`ContainerEngine`] driving the Podman or Docker command line.
///
/// Both engines share a compatible CLI; the differences are the `--format` argument for
/// JSON listings and the shape of the JSON they print, which the parsers below accept in
/// either form.
#[derive(Debug, Clone)]
pub struct CliEngine {
    kind: EngineKind,
    binary: PathBuf,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl CliEngine {
    /// Creates an engine using the given binary.
    pub fn new(kind: EngineKind, binary: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            binary: binary.into(),
        }
    }

    /// Creates a Podman engine using `podman` from `PATH`.
    pub fn podman() -> Self {
        Self::new(EngineKind::Podman, EngineKind::Podman.binary())
    }

    /// Creates a Docker engine using `docker` from `PATH`.
    pub fn docker() -> Self {
        Self::new(EngineKind::Docker, EngineKind::Docker.binary())
    }

    /// The binary this engine invokes.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn json_format(&self) -> &'static str {
        match self.kind {
            EngineKind::Podman => "json",
            EngineKind::Docker => "{{json .}}",
        }
    }

    fn render(&self, args: &[&str]) -> String {
        self.kind.command_hint(args)
    }

    /// Runs the engine with `args` and returns its stdout.
    async fn run(&self, args: &[&str]) -> DeckResult<String> {
        let command = self.render(args);
        tracing::debug!("running: {}", command);

        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| DeckError::Engine {
                command: command.clone(),
                exit_code: None,
                diagnostic: format!("failed to spawn {}: {}", self.binary.display(), e),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let diagnostic = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };

            tracing::debug!("engine command failed: {}: {}", command, diagnostic);
            return Err(DeckError::Engine {
                command,
                exit_code: output.status.code(),
                diagnostic,
            });
        }

        Ok(stdout)
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl ContainerEngine for CliEngine {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    async fn list_containers(&self) -> DeckResult<Vec<ContainerRecord>> {
        let args = ["ps", "--all", "--no-trunc", "--format", self.json_format()];
        let stdout = self.run(&args).await?;
        parse_container_list(&stdout).map_err(|reason| DeckError::MalformedEngineOutput {
            command: self.render(&args),
            reason,
        })
    }

    async fn list_images(&self) -> DeckResult<Vec<ImageRecord>> {
        let args = ["images", "--no-trunc", "--format", self.json_format()];
        let stdout = self.run(&args).await?;
        parse_image_list(&stdout).map_err(|reason| DeckError::MalformedEngineOutput {
            command: self.render(&args),
            reason,
        })
    }

    async fn start_container(&self, name: &str) -> DeckResult<()> {
        self.run(&["start", name]).await.map(|_| ())
    }

    async fn stop_container(&self, name: &str, timeout_secs: u32) -> DeckResult<()> {
        let timeout = timeout_secs.to_string();
        self.run(&["stop", "--time", &timeout, name]).await.map(|_| ())
    }

    async fn restart_container(&self, name: &str) -> DeckResult<()> {
        self.run(&["restart", name]).await.map(|_| ())
    }

    async fn unpause_container(&self, name: &str) -> DeckResult<()> {
        self.run(&["unpause", name]).await.map(|_| ())
    }

    async fn remove_container(&self, name: &str, force: bool) -> DeckResult<()> {
        let mut args = vec!["rm"];
        if force {
            args.push("--force");
        }
        args.push(name);
        self.run(&args).await.map(|_| ())
    }

    async fn remove_image(&self, reference: &str, force: bool) -> DeckResult<()> {
        let mut args = vec!["rmi"];
        if force {
            args.push("--force");
        }
        args.push(reference);
        self.run(&args).await.map(|_| ())
    }

    async fn run_container(&self, spec: &RunSpec) -> DeckResult<String> {
        let ports: Vec<String> = spec.ports.iter().map(|p| p.to_string()).collect();
        let env_file = spec.env_file.as_ref().map(|p| p.display().to_string());

        let mut args = vec!["run", "--detach", "--name", spec.name.as_str()];
        for port in &ports {
            args.push("--publish");
            args.push(port);
        }
        if let Some(env_file) = &env_file {
            args.push("--env-file");
            args.push(env_file);
        }
        args.push(spec.image.as_str());

        let stdout = self.run(&args).await?;
        Ok(stdout.trim().to_string())
    }

    async fn exec(&self, name: &str, command: &[String], interactive: bool) -> DeckResult<ExecOutput> {
        let mut args = vec!["exec".to_string()];
        if interactive {
            args.push("--interactive".to_string());
            args.push("--tty".to_string());
        }
        args.push(name.to_string());
        args.extend(command.iter().cloned());

        let rendered = self.kind.command_hint(&args.iter().map(String::as_str).collect::<Vec<_>>());
        tracing::debug!("running: {}", rendered);

        let mut cmd = Command::new(&self.binary);
        cmd.args(&args).kill_on_drop(true);

        if interactive {
            // Hand the terminal over to the container session
            let status = cmd
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()
                .await
                .map_err(|e| DeckError::Engine {
                    command: rendered,
                    exit_code: None,
                    diagnostic: e.to_string(),
                })?;

            return Ok(ExecOutput {
                exit_code: status.code().unwrap_or(-1),
                ..Default::default()
            });
        }

        let output = cmd.output().await.map_err(|e| DeckError::Engine {
            command: rendered,
            exit_code: None,
            diagnostic: e.to_string(),
        })?;

        Ok(ExecOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn logs(&self, name: &str, tail: Option<usize>) -> DeckResult<String> {
        let tail = tail.map(|t| t.to_string());
        let mut args = vec!["logs"];
        if let Some(tail) = &tail {
            args.push("--tail");
            args.push(tail);
        }
        args.push(name);
        self.run(&args).await
    }

    async fn prune_build_cache(&self) -> DeckResult<()> {
        match self.kind {
            EngineKind::Docker => {
                self.run(&["builder", "prune", "--force"]).await?;
            }
            EngineKind::Podman => {
                self.run(&["image", "prune", "--force"]).await?;
            }
        }
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Parses the output of `ps --all --format json` (podman) or `ps --format '{{json .}}'` (docker).
pub fn parse_container_list(output: &str) -> Result<Vec<ContainerRecord>, String> {
    parse_json_records(output)?
        .iter()
        .map(parse_container)
        .collect()
}

/// Parses the output of `images --format json` (podman) or `images --format '{{json .}}'` (docker).
pub fn parse_image_list(output: &str) -> Result<Vec<ImageRecord>, String> {
    parse_json_records(output)?.iter().map(parse_image).collect()
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

/// Accepts either a single JSON array or one JSON object per line.
fn parse_json_records(output: &str) -> Result<Vec<Value>, String> {
    let trimmed = output.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        return match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Array(items)) => Ok(items),
            Ok(Value::Null) => Ok(Vec::new()),
            Ok(other) => Err(format!("expected a JSON array, got {}", other)),
            Err(e) => Err(format!("invalid JSON: {}", e)),
        };
    }

    trimmed
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str::<Value>(line).map_err(|e| format!("invalid JSON line: {}", e)))
        .collect()
}

fn parse_container(value: &Value) -> Result<ContainerRecord, String> {
    let id = str_field(value, &["Id", "ID"]).ok_or("container entry without an id")?;

    // Podman: `Names` is an array. Docker: a comma separated string.
    let name = match value.get("Names") {
        Some(Value::Array(names)) => names.iter().find_map(Value::as_str).map(String::from),
        Some(Value::String(names)) => names.split(',').next().map(|n| n.trim().to_string()),
        _ => None,
    }
    .map(|name| name.trim_start_matches('/').to_string())
    .ok_or_else(|| format!("container {} has no name", id))?;

    let status = str_field(value, &["State"])
        .map(ContainerStatus::from_engine_state)
        .unwrap_or(ContainerStatus::Unknown);

    let ports = match value.get("Ports") {
        Some(Value::Array(ports)) => ports.iter().filter_map(render_podman_port).collect(),
        Some(Value::String(ports)) if !ports.is_empty() => {
            ports.split(", ").map(String::from).collect()
        }
        _ => Vec::new(),
    };

    Ok(ContainerRecord {
        id: id.to_string(),
        name,
        status,
        image_ref: str_field(value, &["Image"]).unwrap_or_default().to_string(),
        ports,
        created: parse_created(value),
    })
}

fn parse_image(value: &Value) -> Result<ImageRecord, String> {
    let id = str_field(value, &["Id", "ID"]).ok_or("image entry without an id")?;

    let mut references: Vec<String> = match value.get("Names") {
        Some(Value::Array(names)) => names
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    };

    // Docker lists one row per repository:tag.
    if let (Some(repo), Some(tag)) = (
        str_field(value, &["Repository"]),
        str_field(value, &["Tag"]),
    ) {
        if repo != "<none>" {
            let reference = if tag == "<none>" {
                repo.to_string()
            } else {
                format!("{}:{}", repo, tag)
            };
            if !references.contains(&reference) {
                references.push(reference);
            }
        }
    }

    Ok(ImageRecord {
        id: id.to_string(),
        references,
        created: parse_created(value),
    })
}

fn str_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| value.get(*key).and_then(Value::as_str))
}

fn render_podman_port(port: &Value) -> Option<String> {
    let host = port.get("host_port").and_then(Value::as_u64)?;
    let container = port.get("container_port").and_then(Value::as_u64)?;
    let protocol = port
        .get("protocol")
        .and_then(Value::as_str)
        .unwrap_or("tcp");
    Some(format!("{}->{}/{}", host, container, protocol))
}

fn parse_created(value: &Value) -> Option<DateTime<Utc>> {
    // Podman: unix seconds in `Created`. Docker: "2025-01-21 14:30:00 +0000 UTC" in `CreatedAt`.
    if let Some(seconds) = value.get("Created").and_then(Value::as_i64) {
        return Utc.timestamp_opt(seconds, 0).single();
    }

    let created_at = str_field(value, &["CreatedAt"])?;
    if let Ok(parsed) = DateTime::parse_from_rfc3339(created_at) {
        return Some(parsed.with_timezone(&Utc));
    }

    let without_zone = created_at.trim_end_matches(" UTC");
    DateTime::parse_from_str(without_zone, "%Y-%m-%d %H:%M:%S %z")
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(without_zone, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
