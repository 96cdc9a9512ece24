use std::{collections::HashSet, process::Stdio};

use serde::{Deserialize, Serialize};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::{fs, process::Command};

use crate::DeckResult;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// TCP state of a listening socket in `/proc/net/tcp`.
const TCP_LISTEN_STATE: &str = "0A";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A process holding a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    /// The process id.
    pub pid: u32,

    /// The process name.
    pub name: String,

    /// A command that stops the process.
    pub stop_command: String,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ProcessInfo {
    /// Creates a record with the stop command for the current OS.
    pub fn new(pid: u32, name: impl Into<String>) -> Self {
        Self {
            pid,
            name: name.into(),
            stop_command: stop_command_for(pid),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Finds the process listening on `port`.
///
/// The backend is picked by the OS deck runs on: `/proc` (with `lsof` as fallback) on Linux,
/// `lsof` on macOS, `netstat` and `tasklist` on Windows. `None` when nothing was found or the
/// platform tools are missing.
pub async fn find_occupying_process(port: u16) -> DeckResult<Option<ProcessInfo>> {
    let found = match std::env::consts::OS {
        "linux" => match find_with_procfs(port).await? {
            Some(found) => Some(found),
            None => find_with_lsof(port).await,
        },
        "windows" => find_with_netstat(port).await,
        _ => find_with_lsof(port).await,
    };

    Ok(found.map(|(pid, fallback_name)| {
        let name = process_name(pid).unwrap_or(fallback_name);
        ProcessInfo::new(pid, name)
    }))
}

/// The command that stops process `pid` on the current OS.
pub fn stop_command_for(pid: u32) -> String {
    if cfg!(windows) {
        format!("taskkill /PID {} /F", pid)
    } else {
        format!("kill {}", pid)
    }
}

/// Returns the socket inodes listening on `port` in a `/proc/net/tcp{,6}` table.
pub fn parse_proc_net_tcp(contents: &str, port: u16) -> Vec<u64> {
    contents
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let local_address = fields.get(1)?;
            let state = fields.get(3)?;
            let inode = fields.get(9)?;

            let (_, hex_port) = local_address.rsplit_once(':')?;
            let local_port = u16::from_str_radix(hex_port, 16).ok()?;
            if local_port != port || *state != TCP_LISTEN_STATE {
                return None;
            }

            inode.parse::<u64>().ok().filter(|inode| *inode != 0)
        })
        .collect()
}

/// Parses `lsof -nP -iTCP:<port> -sTCP:LISTEN` output into `(pid, command)`.
pub fn parse_lsof_output(output: &str) -> Option<(u32, String)> {
    output.lines().skip(1).find_map(|line| {
        let mut fields = line.split_whitespace();
        let command = fields.next()?;
        let pid = fields.next()?.parse::<u32>().ok()?;
        Some((pid, command.to_string()))
    })
}

/// Parses `netstat -ano` output into the pid listening on `port`.
pub fn parse_netstat_output(output: &str, port: u16) -> Option<u32> {
    let suffix = format!(":{}", port);
    output.lines().find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [proto, local, _remote, state, pid]
                if proto.eq_ignore_ascii_case("tcp")
                    && local.ends_with(&suffix)
                    && state.eq_ignore_ascii_case("listening") =>
            {
                pid.parse::<u32>().ok()
            }
            _ => None,
        }
    })
}

/// Parses the first image name out of `tasklist /FO CSV /NH` output.
pub fn parse_tasklist_csv(output: &str) -> Option<String> {
    let line = output.lines().find(|line| line.starts_with('"'))?;
    let name = line.trim_start_matches('"').split('"').next()?;
    (!name.is_empty()).then(|| name.to_string())
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

/// Looks up a process name by pid.
fn process_name(pid: u32) -> Option<String> {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    system
        .process(pid)
        .map(|process| process.name().to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
}

async fn find_with_procfs(port: u16) -> DeckResult<Option<(u32, String)>> {
    let mut inodes = HashSet::new();
    for table in ["/proc/net/tcp", "/proc/net/tcp6"] {
        if let Ok(contents) = fs::read_to_string(table).await {
            inodes.extend(parse_proc_net_tcp(&contents, port));
        }
    }

    if inodes.is_empty() {
        return Ok(None);
    }

    let mut proc_dir = match fs::read_dir("/proc").await {
        Ok(dir) => dir,
        Err(e) => {
            tracing::debug!("cannot read /proc: {}", e);
            return Ok(None);
        }
    };

    while let Ok(Some(entry)) = proc_dir.next_entry().await {
        let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
            continue;
        };

        // Other users' fd tables are unreadable; skip them.
        let Ok(mut fds) = fs::read_dir(entry.path().join("fd")).await else {
            continue;
        };

        while let Ok(Some(fd)) = fds.next_entry().await {
            let Ok(target) = fs::read_link(fd.path()).await else {
                continue;
            };

            let target = target.to_string_lossy();
            let inode = target
                .strip_prefix("socket:[")
                .and_then(|rest| rest.strip_suffix(']'))
                .and_then(|inode| inode.parse::<u64>().ok());

            if inode.is_some_and(|inode| inodes.contains(&inode)) {
                let comm = fs::read_to_string(entry.path().join("comm"))
                    .await
                    .map(|comm| comm.trim().to_string())
                    .unwrap_or_default();
                return Ok(Some((pid, comm)));
            }
        }
    }

    Ok(None)
}

async fn find_with_lsof(port: u16) -> Option<(u32, String)> {
    let filter = format!("-iTCP:{}", port);
    let output = Command::new("lsof")
        .args(["-nP", &filter, "-sTCP:LISTEN"])
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| tracing::debug!("lsof unavailable: {}", e))
        .ok()?;

    parse_lsof_output(&String::from_utf8_lossy(&output.stdout))
}

async fn find_with_netstat(port: u16) -> Option<(u32, String)> {
    let output = Command::new("netstat")
        .args(["-ano", "-p", "TCP"])
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| tracing::debug!("netstat unavailable: {}", e))
        .ok()?;
    let pid = parse_netstat_output(&String::from_utf8_lossy(&output.stdout), port)?;

    let filter = format!("PID eq {}", pid);
    let name = Command::new("tasklist")
        .args(["/FI", &filter, "/FO", "CSV", "/NH"])
        .stdin(Stdio::null())
        .output()
        .await
        .ok()
        .and_then(|output| parse_tasklist_csv(&String::from_utf8_lossy(&output.stdout)))
        .unwrap_or_default();

    Some((pid, name))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_proc_net_tcp() {
        let table = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode\n   0: 00000000:1388 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 48213 1 0000000000000000 100 0 0 10 0\n   1: 0100007F:1388 0100007F:9C40 01 00000000:00000000 00:00000000 00000000  1000        0 48999 1 0000000000000000 20 4 30 10 -1\n   2: 00000000:2411 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 51111 1 0000000000000000 100 0 0 10 0\n";
        assert_eq!(parse_proc_net_tcp(table, 5000), vec![48213]);
        assert_eq!(parse_proc_net_tcp(table, 9233), vec![51111]);
        assert!(parse_proc_net_tcp(table, 8080).is_empty());
    }

    #[test]
    fn test_parse_lsof_output() {
        let output = "COMMAND  PID  USER   FD   TYPE DEVICE SIZE/OFF NODE NAME\nnode    1234 alice   23u  IPv4 0x1234      0t0  TCP *:5000 (LISTEN)\n";
        assert_eq!(parse_lsof_output(output), Some((1234, "node".to_string())));
        assert_eq!(parse_lsof_output(""), None);
    }

    #[test]
    fn test_parse_netstat_and_tasklist() {
        let netstat = "\nActive Connections\n\n  Proto  Local Address          Foreign Address        State           PID\n  TCP    0.0.0.0:135            0.0.0.0:0              LISTENING       1016\n  TCP    0.0.0.0:5000           0.0.0.0:0              LISTENING       1234\n  TCP    127.0.0.1:50000        127.0.0.1:5000         ESTABLISHED     4321\n";
        assert_eq!(parse_netstat_output(netstat, 5000), Some(1234));
        assert_eq!(parse_netstat_output(netstat, 8080), None);

        let tasklist = "\"node.exe\",\"1234\",\"Console\",\"1\",\"45,120 K\"\n";
        assert_eq!(parse_tasklist_csv(tasklist), Some("node.exe".to_string()));
        assert_eq!(parse_tasklist_csv("INFO: No tasks are running.\n"), None);
    }

    #[test]
    fn test_process_info_stop_command() {
        let info = ProcessInfo::new(1234, "node");
        if cfg!(windows) {
            assert_eq!(info.stop_command, "taskkill /PID 1234 /F");
        } else {
            assert_eq!(info.stop_command, "kill 1234");
        }
    }
}
