//! `deckutils::path` is a module containing path utilities for the deck project.

use std::path::{Path, PathBuf};

use crate::{DeckutilsError, DeckutilsResult};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Resolves a path from an environment variable, falling back to `default_path`.
///
/// When the environment variable is set, the path it names must exist. The default path is
/// returned as-is, so it may also be a bare binary name to be looked up in `PATH` later.
pub fn resolve_env_path(env_var: &str, default_path: impl AsRef<Path>) -> DeckutilsResult<PathBuf> {
    match std::env::var_os(env_var) {
        Some(value) if !value.is_empty() => {
            let path = PathBuf::from(value);
            if !path.exists() {
                return Err(DeckutilsError::BinaryNotFound(
                    path.display().to_string(),
                    format!("environment variable {}", env_var),
                ));
            }

            tracing::debug!("using {} from {}", path.display(), env_var);
            Ok(path)
        }
        _ => Ok(default_path.as_ref().to_path_buf()),
    }
}

/// Returns the file name of `path` as an owned string, or an error for paths like `/` or `..`.
pub fn file_name_string(path: &Path) -> DeckutilsResult<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            DeckutilsError::PathValidation(format!("path has no file name: {}", path.display()))
        })
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
