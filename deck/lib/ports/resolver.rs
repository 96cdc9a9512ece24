use std::{
    collections::{BTreeMap, HashMap, HashSet},
    io::ErrorKind,
    sync::Arc,
};

use async_trait::async_trait;
use futures::future;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use crate::{
    config::{base_port_for, MAX_PORT},
    DeckError, DeckResult,
};

use super::{find_occupying_process, ProcessInfo};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Answers whether a port is free and who holds it.
#[async_trait]
pub trait PortProbe: Send + Sync {
    /// Returns true if nothing is listening on `port`.
    async fn is_available(&self, port: u16) -> bool;

    /// Finds the process holding `port`.
    async fn occupying_process(&self, port: u16) -> DeckResult<Option<ProcessInfo>>;
}

/// Probes the real network stack of the host.
#[derive(Debug, Clone, Default)]
pub struct SystemPortProbe;

/// A probe over a fixed set of occupied ports.
#[derive(Debug, Clone, Default)]
pub struct FixturePortProbe {
    occupied: HashMap<u16, Option<ProcessInfo>>,
}

/// The state of one declared port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortCheckResult {
    /// The declaring key, like `DEV_PORT`.
    pub name: String,

    /// The declared port.
    pub port: u16,

    /// Whether the port is free.
    pub available: bool,

    /// Who holds the port, if it is taken and the owner could be found.
    pub occupying_process: Option<ProcessInfo>,

    /// A free substitute, if the port is taken.
    pub suggested_port: Option<u16>,
}

/// A port handed out for a port type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortAllocation {
    /// The port type, like `DEBUG_PORT`.
    pub port_type: String,

    /// The port that was asked for.
    pub requested_port: u16,

    /// The port that was handed out.
    pub resolved_port: u16,

    /// Who holds `requested_port`, if it had to be substituted.
    pub occupying_process: Option<ProcessInfo>,
}

/// Detects port conflicts and allocates substitutes.
#[derive(Clone)]
pub struct PortResolver {
    probe: Arc<dyn PortProbe>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl FixturePortProbe {
    /// Marks `port` as occupied, optionally by a known process.
    pub fn occupy(mut self, port: u16, process: Option<ProcessInfo>) -> Self {
        self.occupied.insert(port, process);
        self
    }
}

impl PortCheckResult {
    /// Renders the conflict for the user, `None` if the port is free.
    pub fn conflict_message(&self) -> Option<String> {
        if self.available {
            return None;
        }

        let holder = match &self.occupying_process {
            Some(process) => format!(
                "process '{}' (PID {}); stop it with `{}`",
                process.name, process.pid, process.stop_command
            ),
            None => "an unknown process".to_string(),
        };

        let suggestion = self
            .suggested_port
            .map(|port| format!(", or use {}={}", self.name, port))
            .unwrap_or_default();

        Some(format!(
            "{} port {} is in use by {}{}",
            self.name, self.port, holder, suggestion
        ))
    }
}

impl PortAllocation {
    /// Returns true if the requested port had to be replaced.
    pub fn was_substituted(&self) -> bool {
        self.requested_port != self.resolved_port
    }
}

impl PortResolver {
    /// Creates a resolver using `probe`.
    pub fn new(probe: Arc<dyn PortProbe>) -> Self {
        Self { probe }
    }

    /// Creates a resolver probing the host.
    pub fn system() -> Self {
        Self::new(Arc::new(SystemPortProbe))
    }

    /// Checks every declared port.
    ///
    /// All ports are probed concurrently. Taken ports get their owner looked up and a free
    /// substitute suggested; suggestions never collide with each other or with a declared port.
    pub async fn check_ports(&self, declared: &BTreeMap<String, u16>) -> DeckResult<Vec<PortCheckResult>> {
        let availability = future::join_all(
            declared
                .values()
                .map(|port| self.probe.is_available(*port)),
        )
        .await;

        let owners = future::join_all(declared.iter().zip(&availability).map(
            |((_, port), available)| async move {
                if *available {
                    Ok(None)
                } else {
                    self.probe.occupying_process(*port).await
                }
            },
        ))
        .await;

        let mut reserved: HashSet<u16> = declared.values().copied().collect();
        let mut results = Vec::with_capacity(declared.len());
        for (((name, port), available), owner) in declared.iter().zip(availability).zip(owners) {
            let occupying_process = owner?;
            let suggested_port = if available {
                None
            } else {
                tracing::info!("{} port {} is in use", name, port);
                let start = port.saturating_add(1).max(*port);
                let suggestion = self.scan(name, start, MAX_PORT, &reserved).await.ok();
                if let Some(suggestion) = suggestion {
                    reserved.insert(suggestion);
                }
                suggestion
            };

            results.push(PortCheckResult {
                name: name.clone(),
                port: *port,
                available,
                occupying_process,
                suggested_port,
            });
        }

        Ok(results)
    }

    /// Finds the process holding `port`.
    pub async fn find_occupying_process(&self, port: u16) -> DeckResult<Option<ProcessInfo>> {
        self.probe.occupying_process(port).await
    }

    /// Returns the first free port in `[start, end]`. A `start` of 0 scans from port 1.
    ///
    /// ## Errors
    /// [`DeckError::PortConflict`] if every port in the range is taken or the range is empty.
    pub async fn find_available_port(&self, start: u16, end: u16) -> DeckResult<u16> {
        self.scan("port", start, end, &HashSet::new()).await
    }

    /// Hands out a free port for each port type, starting at the type's base port.
    ///
    /// No port is handed out twice within one call.
    pub async fn auto_allocate(&self, port_types: &[String]) -> DeckResult<Vec<PortAllocation>> {
        let mut assigned = HashSet::new();
        let mut allocations = Vec::with_capacity(port_types.len());
        for port_type in port_types {
            let base = base_port_for(port_type);
            let resolved = self.scan(port_type, base, MAX_PORT, &assigned).await?;
            assigned.insert(resolved);
            tracing::debug!("allocated {} for {}", resolved, port_type);

            allocations.push(PortAllocation {
                port_type: port_type.clone(),
                requested_port: base,
                resolved_port: resolved,
                occupying_process: None,
            });
        }

        Ok(allocations)
    }

    /// Keeps every free declared port and substitutes each taken one.
    pub async fn resolve(&self, declared: &BTreeMap<String, u16>) -> DeckResult<Vec<PortAllocation>> {
        let checks = self.check_ports(declared).await?;
        Self::allocations(&checks)
    }

    /// Turns port checks into allocations: free ports as declared, taken ones as suggested.
    ///
    /// ## Errors
    /// [`DeckError::PortConflict`] for a taken port that has no suggestion.
    pub fn allocations(checks: &[PortCheckResult]) -> DeckResult<Vec<PortAllocation>> {
        checks
            .iter()
            .map(|check| {
                let resolved_port = match (check.available, check.suggested_port) {
                    (true, _) => check.port,
                    (false, Some(port)) => port,
                    (false, None) => {
                        return Err(DeckError::PortConflict {
                            port_type: check.name.clone(),
                            start: check.port,
                            end: MAX_PORT,
                        })
                    }
                };

                Ok(PortAllocation {
                    port_type: check.name.clone(),
                    requested_port: check.port,
                    resolved_port,
                    occupying_process: check.occupying_process.clone(),
                })
            })
            .collect()
    }

    async fn scan(&self, port_type: &str, start: u16, end: u16, skip: &HashSet<u16>) -> DeckResult<u16> {
        // Port 0 means "any port" to the OS, so scanning starts at 1.
        let first = start.max(1);
        if first <= end {
            for port in first..=end {
                if skip.contains(&port) {
                    continue;
                }

                if self.probe.is_available(port).await {
                    return Ok(port);
                }
            }
        }

        Err(DeckError::PortConflict {
            port_type: port_type.to_string(),
            start,
            end,
        })
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl PortProbe for SystemPortProbe {
    async fn is_available(&self, port: u16) -> bool {
        match TcpListener::bind(("0.0.0.0", port)).await {
            Ok(_) => true,
            Err(e) if e.kind() == ErrorKind::AddrInUse => false,
            Err(e) => {
                tracing::debug!("cannot bind port {}: {}", port, e);
                false
            }
        }
    }

    async fn occupying_process(&self, port: u16) -> DeckResult<Option<ProcessInfo>> {
        find_occupying_process(port).await
    }
}

#[async_trait]
impl PortProbe for FixturePortProbe {
    async fn is_available(&self, port: u16) -> bool {
        !self.occupied.contains_key(&port)
    }

    async fn occupying_process(&self, port: u16) -> DeckResult<Option<ProcessInfo>> {
        Ok(self.occupied.get(&port).cloned().flatten())
    }
}

impl std::fmt::Debug for PortResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortResolver").finish_non_exhaustive()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
