//! Deck project initialization.
//!
//! A deck project is any directory with a `.deck` directory holding the three resource layers
//! and a `config.json`.

use std::path::{Path, PathBuf};

use tokio::{fs, io::AsyncWriteExt};

use crate::{
    config::{DeckConfig, DEFAULT_CONFIG},
    resources::Layer,
    utils::DECK_DIR,
    DeckError, DeckResult,
};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Initializes a deck project and returns its `.deck` directory.
///
/// Running it again on an initialized project changes nothing: existing directories, config
/// and `.gitignore` entries are left as they are.
///
/// ## Example
/// ```no_run
/// use deck::management;
///
/// # async fn example() -> anyhow::Result<()> {
/// // Initialize in the current directory
/// management::initialize(None).await?;
///
/// // Initialize in a specific directory
/// management::initialize(Some("my_project".into())).await?;
/// # Ok(())
/// # }
/// ```
pub async fn initialize(project_dir: Option<PathBuf>) -> DeckResult<PathBuf> {
    let project_dir = project_dir.unwrap_or_else(|| PathBuf::from("."));

    let deck_dir = ensure_deck_dirs(&project_dir).await?;

    create_default_config(&project_dir).await?;
    tracing::info!(
        "config file at {}",
        DeckConfig::path(&project_dir).display()
    );

    update_gitignore(&project_dir).await?;

    Ok(deck_dir)
}

/// Returns true if `project_dir` has a `.deck` directory.
pub async fn is_initialized(project_dir: &Path) -> bool {
    fs::metadata(project_dir.join(DECK_DIR))
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

/// Creates `.deck` and one directory per layer.
pub(crate) async fn ensure_deck_dirs(project_dir: &Path) -> DeckResult<PathBuf> {
    let deck_dir = project_dir.join(DECK_DIR);
    for layer in Layer::ALL {
        let layer_dir = deck_dir.join(layer.subdir());
        fs::create_dir_all(&layer_dir)
            .await
            .map_err(|e| DeckError::fs(&layer_dir, e))?;
    }

    tracing::debug!("deck directories at {}", deck_dir.display());
    Ok(deck_dir)
}

/// Writes the default config, unless one exists.
pub(crate) async fn create_default_config(project_dir: &Path) -> DeckResult<()> {
    let config_path = DeckConfig::path(project_dir);
    if fs::try_exists(&config_path)
        .await
        .map_err(|e| DeckError::fs(&config_path, e))?
    {
        return Ok(());
    }

    fs::write(&config_path, DEFAULT_CONFIG)
        .await
        .map_err(|e| DeckError::fs(&config_path, e))
}

/// Adds `.deck/` to the project's `.gitignore`, creating the file if needed.
pub(crate) async fn update_gitignore(project_dir: &Path) -> DeckResult<()> {
    let gitignore_path = project_dir.join(".gitignore");
    let canonical_entry = format!("{}/", DECK_DIR);
    let acceptable_entries = [DECK_DIR, &canonical_entry[..], "/.deck", "/.deck/"];

    if !gitignore_path.exists() {
        return fs::write(&gitignore_path, format!("{}\n", canonical_entry))
            .await
            .map_err(|e| DeckError::fs(&gitignore_path, e));
    }

    let content = fs::read_to_string(&gitignore_path)
        .await
        .map_err(|e| DeckError::fs(&gitignore_path, e))?;
    let already_present = content
        .lines()
        .any(|line| acceptable_entries.contains(&line.trim()));
    if already_present {
        return Ok(());
    }

    let prefix = if content.is_empty() || content.ends_with('\n') {
        ""
    } else {
        "\n"
    };
    let mut file = fs::OpenOptions::new()
        .append(true)
        .open(&gitignore_path)
        .await
        .map_err(|e| DeckError::fs(&gitignore_path, e))?;
    file.write_all(format!("{}{}\n", prefix, canonical_entry).as_bytes())
        .await
        .map_err(|e| DeckError::fs(&gitignore_path, e))?;

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initialize_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let deck_dir = initialize(Some(dir.path().to_path_buf())).await.unwrap();

        for layer in Layer::ALL {
            assert!(deck_dir.join(layer.subdir()).is_dir());
        }
        assert!(is_initialized(dir.path()).await);

        let config = std::fs::read_to_string(DeckConfig::path(dir.path())).unwrap();
        assert_eq!(config, DEFAULT_CONFIG);
        let gitignore = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(gitignore, ".deck/\n");
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "target").unwrap();

        initialize(Some(dir.path().to_path_buf())).await.unwrap();
        std::fs::write(DeckConfig::path(dir.path()), r#"{"engine": "docker"}"#).unwrap();
        initialize(Some(dir.path().to_path_buf())).await.unwrap();

        let gitignore = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(gitignore, "target\n.deck/\n");
        let config = std::fs::read_to_string(DeckConfig::path(dir.path())).unwrap();
        assert_eq!(config, r#"{"engine": "docker"}"#);
    }

    #[tokio::test]
    async fn test_uninitialized_project() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_initialized(dir.path()).await);
    }
}
