use std::{
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};

use chrono::{DateTime, Utc};
use tokio::fs;

use crate::{
    config::DeckConfig,
    utils::{DECK_DIR, GIT_DIR, METADATA_FILENAME},
    DeckError, DeckResult,
};

use super::{numbered_name, timestamped_name, validate_name, BuildStatus, Completeness, ImageMetadata, Layer, ResourceEntry};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Owns the `.deck/{templates,custom,images}` directories.
///
/// Every write into an Images entry goes through the manager, which only ever touches the
/// entry's `.deck-metadata`.
#[derive(Debug, Clone)]
pub struct DirectoryManager {
    deck_dir: PathBuf,
    creator: String,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl DirectoryManager {
    /// Creates a manager for the `.deck` directory at `deck_dir`.
    pub fn new(deck_dir: impl Into<PathBuf>, creator: impl Into<String>) -> Self {
        Self {
            deck_dir: deck_dir.into(),
            creator: creator.into(),
        }
    }

    /// Creates a manager for the `.deck` directory of a project.
    pub fn for_project(project_dir: &Path, config: &DeckConfig) -> Self {
        Self::new(project_dir.join(DECK_DIR), config.creator())
    }

    /// The `.deck` directory.
    pub fn deck_dir(&self) -> &Path {
        &self.deck_dir
    }

    /// The directory of a layer.
    pub fn layer_dir(&self, layer: Layer) -> PathBuf {
        self.deck_dir.join(layer.subdir())
    }

    /// The directory of an entry, whether it exists or not.
    pub fn entry_path(&self, layer: Layer, name: &str) -> PathBuf {
        self.layer_dir(layer).join(name)
    }

    /// Lists the entries of a layer, sorted by name.
    ///
    /// A missing layer directory has no entries. Hidden directories (like a synced `.git`) and
    /// plain files are skipped.
    pub async fn list_entries(&self, layer: Layer) -> DeckResult<Vec<ResourceEntry>> {
        let layer_dir = self.layer_dir(layer);
        let mut read_dir = match fs::read_dir(&layer_dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("layer directory {} does not exist", layer_dir.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(DeckError::fs(&layer_dir, e)),
        };

        let mut entries = Vec::new();
        while let Some(dir_entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| DeckError::fs(&layer_dir, e))?
        {
            let name = dir_entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || name == GIT_DIR {
                continue;
            }

            let file_type = dir_entry
                .file_type()
                .await
                .map_err(|e| DeckError::fs(dir_entry.path(), e))?;
            if !file_type.is_dir() {
                continue;
            }

            entries.push(self.describe(layer, name, dir_entry.path()).await?);
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Returns a single entry.
    pub async fn entry(&self, layer: Layer, name: &str) -> DeckResult<ResourceEntry> {
        let path = self.existing_entry_path(layer, name).await?;
        self.describe(layer, name.to_string(), path).await
    }

    /// Checks a directory for the required files. Calling it has no side effects.
    pub async fn validate_completeness(&self, path: &Path) -> DeckResult<Completeness> {
        Completeness::check(path).await
    }

    /// Copies an entry into the next layer and returns the new entry's name.
    ///
    /// ## Arguments
    /// * `source_layer` - `Templates` or `Custom`
    /// * `name` - the entry to promote
    /// * `target_layer` - the layer right after `source_layer`
    ///
    /// Templates→Custom keeps the name; Custom→Images appends a `yyyyMMdd-HHmm` stamp. A taken
    /// name gets `-2`, `-3`, ... appended. The source is never modified.
    pub async fn promote(
        &self,
        source_layer: Layer,
        name: &str,
        target_layer: Layer,
    ) -> DeckResult<String> {
        self.promote_at(source_layer, name, target_layer, Utc::now())
            .await
    }

    /// Same as [`promote`](Self::promote), with the clock supplied by the caller.
    pub async fn promote_at(
        &self,
        source_layer: Layer,
        name: &str,
        target_layer: Layer,
        now: DateTime<Utc>,
    ) -> DeckResult<String> {
        if source_layer.promotes_to() != Some(target_layer) {
            return Err(DeckError::InvalidPromotion {
                from: source_layer.to_string(),
                to: target_layer.to_string(),
            });
        }

        let source = self.entry(source_layer, name).await?;
        if target_layer == Layer::Images && !source.is_complete() {
            return Err(DeckError::ResourceIncomplete {
                name: source.name.clone(),
                missing: source.missing_files.iter().map(|f| f.to_string()).collect(),
            });
        }

        // Images names double as engine image names, so they get the strict check.
        let base = match target_layer {
            Layer::Images => {
                let base = timestamped_name(name, now);
                validate_name(&base)?;
                base
            }
            _ => name.to_string(),
        };

        let target_layer_dir = self.layer_dir(target_layer);
        fs::create_dir_all(&target_layer_dir)
            .await
            .map_err(|e| DeckError::fs(&target_layer_dir, e))?;

        let (new_name, target) = self.claim_name(target_layer, &base).await?;
        tracing::info!(
            "promoting {}/{} to {}/{}",
            source_layer,
            name,
            target_layer,
            new_name
        );

        if let Err(e) = deckutils::copy_dir(&source.path, &target).await {
            tracing::error!("promotion of {} failed, removing {}", name, target.display());
            if let Err(cleanup) = fs::remove_dir_all(&target).await {
                tracing::warn!("failed to remove {}: {}", target.display(), cleanup);
            }
            return Err(e.into());
        }

        if target_layer == Layer::Images {
            // The copied tree may carry a stale record; the new entry gets its own.
            let stale = target.join(METADATA_FILENAME);
            match fs::remove_file(&stale).await {
                Ok(()) => tracing::debug!("dropped copied {}", stale.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(DeckError::fs(&stale, e)),
            }

            let metadata = ImageMetadata::builder()
                .image_name(new_name.clone())
                .created_at(now)
                .created_by(self.creator.clone())
                .source_config(name)
                .build_status(BuildStatus::Prepared)
                .build();
            self.write_metadata(&metadata).await?;
        }

        Ok(new_name)
    }

    /// Reads the metadata of an Images entry. `None` if the entry has no metadata file.
    pub async fn read_metadata(&self, image_name: &str) -> DeckResult<Option<ImageMetadata>> {
        let entry_path = self.existing_entry_path(Layer::Images, image_name).await?;
        let path = entry_path.join(METADATA_FILENAME);

        match fs::read_to_string(&path).await {
            Ok(contents) => ImageMetadata::parse(&contents, &path).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DeckError::fs(&path, e)),
        }
    }

    /// Writes the metadata of an Images entry, replacing the previous record.
    pub async fn write_metadata(&self, metadata: &ImageMetadata) -> DeckResult<()> {
        let entry_path = self
            .existing_entry_path(Layer::Images, metadata.get_image_name())
            .await?;
        let path = entry_path.join(METADATA_FILENAME);

        deckutils::write_atomic(&path, metadata.to_file_contents()).await?;
        tracing::debug!("wrote metadata {}", path.display());

        Ok(())
    }

    /// Reads, modifies and writes back the metadata of an Images entry.
    ///
    /// An entry without a metadata file gets a fresh record first.
    pub async fn update_metadata(
        &self,
        image_name: &str,
        update: impl FnOnce(&mut ImageMetadata),
    ) -> DeckResult<ImageMetadata> {
        let mut metadata = match self.read_metadata(image_name).await? {
            Some(metadata) => metadata,
            None => ImageMetadata::builder()
                .image_name(image_name)
                .created_at(Utc::now())
                .created_by(self.creator.clone())
                .source_config(String::new())
                .build(),
        };

        update(&mut metadata);
        self.write_metadata(&metadata).await?;

        Ok(metadata)
    }

    /// Writes a file inside an entry.
    ///
    /// Images entries are immutable: writing anything there other than `.deck-metadata` is a
    /// [`DeckError::PermissionViolation`]. Paths escaping the entry are rejected.
    pub async fn write_file(
        &self,
        layer: Layer,
        name: &str,
        relative_path: &Path,
        contents: impl AsRef<[u8]>,
    ) -> DeckResult<PathBuf> {
        let entry_path = self.existing_entry_path(layer, name).await?;
        let path = entry_path.join(relative_path);

        let escapes = relative_path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || relative_path.as_os_str().is_empty() {
            return Err(DeckError::PermissionViolation(path));
        }

        if layer == Layer::Images && relative_path != Path::new(METADATA_FILENAME) {
            tracing::warn!("refusing to modify {}", path.display());
            return Err(DeckError::PermissionViolation(path));
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DeckError::fs(parent, e))?;
        }
        deckutils::write_atomic(&path, contents).await?;

        Ok(path)
    }

    /// Deletes an entry directory with everything in it.
    pub async fn remove_entry(&self, layer: Layer, name: &str) -> DeckResult<()> {
        let path = self.existing_entry_path(layer, name).await?;
        fs::remove_dir_all(&path)
            .await
            .map_err(|e| DeckError::fs(&path, e))?;
        tracing::info!("removed {}", path.display());

        Ok(())
    }

    async fn describe(&self, layer: Layer, name: String, path: PathBuf) -> DeckResult<ResourceEntry> {
        let completeness = Completeness::check(&path).await?;
        let created_at = fs::metadata(&path)
            .await
            .ok()
            .and_then(|m| m.created().or_else(|_| m.modified()).ok())
            .map(DateTime::<Utc>::from);

        Ok(ResourceEntry {
            name,
            layer,
            path,
            created_at,
            required_files: completeness.present,
            missing_files: completeness.missing,
        })
    }

    async fn is_dir(&self, path: &Path) -> DeckResult<bool> {
        match fs::metadata(path).await {
            Ok(metadata) => Ok(metadata.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(DeckError::fs(path, e)),
        }
    }

    async fn existing_entry_path(&self, layer: Layer, name: &str) -> DeckResult<PathBuf> {
        let plain = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\']);
        if !plain {
            return Err(DeckError::InvalidResourceName(name.to_string()));
        }

        let path = self.entry_path(layer, name);
        if !self.is_dir(&path).await? {
            return Err(DeckError::ResourceNotFound {
                layer: layer.to_string(),
                name: name.to_string(),
                path,
            });
        }

        Ok(path)
    }

    /// Creates the first free `{base}`, `{base}-2`, ... directory.
    ///
    /// The directory is created with `create_dir`, so a name raced by another process is
    /// skipped rather than shared.
    async fn claim_name(&self, layer: Layer, base: &str) -> DeckResult<(String, PathBuf)> {
        let layer_dir = self.layer_dir(layer);
        for counter in 1u32.. {
            let attempt = numbered_name(base, counter);
            let candidate_dir = layer_dir.join(&attempt);
            match fs::create_dir(&candidate_dir).await {
                Ok(()) => return Ok((attempt, candidate_dir)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(DeckError::fs(&candidate_dir, e)),
            }
        }

        Err(DeckError::fs(
            layer_dir.join(base),
            std::io::Error::from(ErrorKind::AlreadyExists),
        ))
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn write_complete(dir: &Path) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(".env"), "DEV_PORT=5000\n").unwrap();
        std::fs::write(dir.join("docker-compose.yml"), "services: {}\n").unwrap();
        std::fs::write(dir.join("Dockerfile"), "FROM node:20\n").unwrap();
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 21, 14, 30, 0).unwrap()
    }

    #[tokio::test]
    async fn test_list_entries_skips_hidden_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let manager = DirectoryManager::new(dir.path(), "alice");
        let templates = manager.layer_dir(Layer::Templates);
        write_complete(&templates.join("nodejs-app"));
        std::fs::create_dir_all(templates.join(".git")).unwrap();
        std::fs::create_dir_all(templates.join("half-done")).unwrap();
        std::fs::write(templates.join("README.md"), "# templates\n").unwrap();

        let entries = manager.list_entries(Layer::Templates).await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["half-done", "nodejs-app"]);
        assert!(!entries[0].is_complete());
        assert!(entries[1].is_complete());

        assert!(manager.list_entries(Layer::Images).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_promote_template_to_custom_keeps_name() {
        let dir = tempfile::tempdir().unwrap();
        let manager = DirectoryManager::new(dir.path(), "alice");
        write_complete(&manager.entry_path(Layer::Templates, "nodejs-app"));

        let first = manager
            .promote(Layer::Templates, "nodejs-app", Layer::Custom)
            .await
            .unwrap();
        let second = manager
            .promote(Layer::Templates, "nodejs-app", Layer::Custom)
            .await
            .unwrap();

        assert_eq!(first, "nodejs-app");
        assert_eq!(second, "nodejs-app-2");
        assert!(manager.entry_path(Layer::Custom, "nodejs-app").join(".env").exists());
        assert!(manager.entry_path(Layer::Templates, "nodejs-app").exists());
    }

    #[tokio::test]
    async fn test_promote_skips_every_taken_name() {
        let dir = tempfile::tempdir().unwrap();
        let manager = DirectoryManager::new(dir.path(), "alice");
        write_complete(&manager.entry_path(Layer::Templates, "api"));
        std::fs::create_dir_all(manager.entry_path(Layer::Custom, "api")).unwrap();
        std::fs::create_dir_all(manager.entry_path(Layer::Custom, "api-2")).unwrap();
        std::fs::write(manager.layer_dir(Layer::Custom).join("api-3"), "not a directory").unwrap();

        let name = manager
            .promote(Layer::Templates, "api", Layer::Custom)
            .await
            .unwrap();

        assert_eq!(name, "api-4");
        assert!(manager.entry_path(Layer::Custom, "api-4").join(".env").exists());
        assert!(manager.entry_path(Layer::Custom, "api-2").read_dir().unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_promote_custom_to_images_writes_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let manager = DirectoryManager::new(dir.path(), "alice");
        write_complete(&manager.entry_path(Layer::Custom, "nodejs-app"));
        std::fs::write(
            manager.entry_path(Layer::Custom, "nodejs-app").join(METADATA_FILENAME),
            "IMAGE_NAME=stale\nCREATED_AT=2020-01-01T00:00:00Z\n",
        )
        .unwrap();

        let name = manager
            .promote_at(Layer::Custom, "nodejs-app", Layer::Images, now())
            .await
            .unwrap();
        assert_eq!(name, "nodejs-app-20250121-1430");

        let metadata = manager.read_metadata(&name).await.unwrap().unwrap();
        assert_eq!(metadata.get_image_name(), &name);
        assert_eq!(metadata.get_source_config(), "nodejs-app");
        assert_eq!(metadata.get_created_by(), "alice");
        assert_eq!(metadata.get_build_status(), &BuildStatus::Prepared);
    }

    #[tokio::test]
    async fn test_promote_rejects_wrong_direction_and_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        let manager = DirectoryManager::new(dir.path(), "alice");
        std::fs::create_dir_all(manager.entry_path(Layer::Custom, "broken")).unwrap();

        assert!(matches!(
            manager.promote(Layer::Templates, "broken", Layer::Images).await,
            Err(DeckError::InvalidPromotion { .. })
        ));
        assert!(matches!(
            manager.promote(Layer::Custom, "broken", Layer::Images).await,
            Err(DeckError::ResourceIncomplete { missing, .. }) if missing.len() == 3
        ));
        assert!(matches!(
            manager.promote(Layer::Custom, "absent", Layer::Images).await,
            Err(DeckError::ResourceNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_images_entries_are_immutable() {
        let dir = tempfile::tempdir().unwrap();
        let manager = DirectoryManager::new(dir.path(), "alice");
        write_complete(&manager.entry_path(Layer::Custom, "app"));
        let name = manager
            .promote_at(Layer::Custom, "app", Layer::Images, now())
            .await
            .unwrap();

        let err = manager
            .write_file(Layer::Images, &name, Path::new(".env"), "DEV_PORT=1\n")
            .await
            .unwrap_err();
        assert!(matches!(err, DeckError::PermissionViolation(path) if path.ends_with(".env")));

        let err = manager
            .write_file(Layer::Custom, "app", Path::new("../other/.env"), "X=1\n")
            .await
            .unwrap_err();
        assert!(matches!(err, DeckError::PermissionViolation(_)));

        manager
            .write_file(Layer::Custom, "app", Path::new(".env"), "DEV_PORT=5001\n")
            .await
            .unwrap();

        let updated = manager
            .update_metadata(&name, |m| m.set_build_status(BuildStatus::Built))
            .await
            .unwrap();
        assert_eq!(updated.get_build_status(), &BuildStatus::Built);
    }

    #[tokio::test]
    async fn test_remove_entry() {
        let dir = tempfile::tempdir().unwrap();
        let manager = DirectoryManager::new(dir.path(), "alice");
        write_complete(&manager.entry_path(Layer::Custom, "app"));

        manager.remove_entry(Layer::Custom, "app").await.unwrap();
        assert!(!manager.entry_path(Layer::Custom, "app").exists());
        assert!(matches!(
            manager.remove_entry(Layer::Custom, "app").await,
            Err(DeckError::ResourceNotFound { .. })
        ));
    }
}
