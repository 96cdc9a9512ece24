//! `deckutils::fs` contains filesystem helpers shared across the deck crates.

use std::path::Path;

use tokio::fs;

use crate::{DeckutilsError, DeckutilsResult};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Recursively copies `source_dir` into `dest_dir`, including hidden files.
///
/// The destination is created if it doesn't exist. Symlinks are recreated as symlinks on unix
/// and copied as regular files elsewhere. Every I/O failure carries the path it happened on.
pub async fn copy_dir(source_dir: impl AsRef<Path>, dest_dir: impl AsRef<Path>) -> DeckutilsResult<()> {
    let source_dir = source_dir.as_ref();
    let dest_dir = dest_dir.as_ref();

    let mut stack = vec![source_dir.to_path_buf()];
    while let Some(current_path) = stack.pop() {
        let relative = current_path.strip_prefix(source_dir).map_err(|_| {
            DeckutilsError::PathValidation(format!(
                "{} is not inside {}",
                current_path.display(),
                source_dir.display()
            ))
        })?;

        let target_dir = dest_dir.join(relative);
        fs::create_dir_all(&target_dir)
            .await
            .map_err(|e| DeckutilsError::path_io(&target_dir, e))?;

        let mut entries = fs::read_dir(&current_path)
            .await
            .map_err(|e| DeckutilsError::path_io(&current_path, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| DeckutilsError::path_io(&current_path, e))?
        {
            let path = entry.path();
            let target_path = target_dir.join(entry.file_name());
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| DeckutilsError::path_io(&path, e))?;

            if file_type.is_dir() {
                stack.push(path);
            } else if file_type.is_symlink() {
                copy_symlink(&path, &target_path).await?;
            } else {
                fs::copy(&path, &target_path)
                    .await
                    .map_err(|e| DeckutilsError::path_io(&target_path, e))?;
            }
        }
    }

    Ok(())
}

/// Writes `contents` to `path` through a sibling temporary file and a rename.
pub async fn write_atomic(path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> DeckutilsResult<()> {
    let path = path.as_ref();
    let file_name = path
        .file_name()
        .ok_or_else(|| DeckutilsError::PathValidation(format!("no file name: {}", path.display())))?;

    let tmp_path = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));
    fs::write(&tmp_path, contents)
        .await
        .map_err(|e| DeckutilsError::path_io(&tmp_path, e))?;

    fs::rename(&tmp_path, path)
        .await
        .map_err(|e| DeckutilsError::path_io(path, e))?;

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

#[cfg(unix)]
async fn copy_symlink(source: &Path, target: &Path) -> DeckutilsResult<()> {
    let link = fs::read_link(source)
        .await
        .map_err(|e| DeckutilsError::path_io(source, e))?;
    fs::symlink(&link, target)
        .await
        .map_err(|e| DeckutilsError::path_io(target, e))
}

#[cfg(not(unix))]
async fn copy_symlink(source: &Path, target: &Path) -> DeckutilsResult<()> {
    fs::copy(source, target)
        .await
        .map(|_| ())
        .map_err(|e| DeckutilsError::path_io(target, e))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
