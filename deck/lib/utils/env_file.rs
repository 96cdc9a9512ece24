use std::{collections::BTreeMap, path::Path};

use tokio::fs;

use crate::{DeckError, DeckResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Keys ending with this suffix are treated as declared ports.
const PORT_KEY_SUFFIX: &str = "_PORT";

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Reads the ports a resource declares in its `.env` file.
///
/// Every `*_PORT` key with a value in `1..=65535` is returned. Keys with other values are
/// ignored, since templates often leave placeholders like `DEV_PORT=${PORT}`.
pub async fn read_declared_ports(env_path: &Path) -> DeckResult<BTreeMap<String, u16>> {
    let env_path = env_path.to_path_buf();
    tokio::task::spawn_blocking(move || -> DeckResult<BTreeMap<String, u16>> {
        let iter = dotenvy::from_path_iter(&env_path).map_err(|e| env_error(&env_path, e))?;

        let mut ports = BTreeMap::new();
        for item in iter {
            let (key, value) = item.map_err(|e| env_error(&env_path, e))?;
            if !key.ends_with(PORT_KEY_SUFFIX) {
                continue;
            }

            match value.trim().parse::<u16>() {
                Ok(port) if port > 0 => {
                    ports.insert(key, port);
                }
                _ => tracing::debug!("ignoring non-numeric port {}={}", key, value),
            }
        }

        Ok(ports)
    })
    .await?
}

/// Rewrites the given port keys in an `.env` file, keeping every other line as it was.
///
/// Keys that don't appear in the file yet are appended at the end.
pub async fn rewrite_env_ports(env_path: &Path, ports: &BTreeMap<String, u16>) -> DeckResult<()> {
    let contents = fs::read_to_string(env_path)
        .await
        .map_err(|e| DeckError::fs(env_path, e))?;

    let mut remaining = ports.clone();
    let mut lines = Vec::new();
    for line in contents.lines() {
        let key = line
            .trim_start()
            .trim_start_matches("export ")
            .split_once('=')
            .map(|(key, _)| key.trim());

        match key.and_then(|key| remaining.remove_entry(key)) {
            Some((key, port)) => lines.push(format!("{}={}", key, port)),
            None => lines.push(line.to_string()),
        }
    }

    for (key, port) in remaining {
        lines.push(format!("{}={}", key, port));
    }

    let mut rewritten = lines.join("\n");
    rewritten.push('\n');
    deckutils::write_atomic(env_path, rewritten).await?;

    Ok(())
}

fn env_error(path: &Path, error: dotenvy::Error) -> DeckError {
    DeckError::EnvFile {
        path: path.to_path_buf(),
        reason: error.to_string(),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
