use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    process::Stdio,
    sync::Arc,
};

use async_trait::async_trait;
use tokio::{fs, process::Command};

use crate::{
    config::{DeckConfig, TemplateSyncKind},
    utils::GIT_DIR,
    DeckError, DeckResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Mirrors a remote template repository into the Templates layer.
#[async_trait]
pub trait TemplateSync: Send + Sync {
    /// Makes `dest` an exact copy of `branch` of `repo_url`.
    async fn sync_templates(&self, repo_url: &str, branch: &str, dest: &Path) -> DeckResult<()>;
}

/// Syncs with the `git` command line.
///
/// The first sync is a shallow clone; later syncs fetch the branch and hard-reset to it, so
/// local edits to templates are discarded.
#[derive(Debug, Clone)]
pub struct GitTemplateSync {
    git: PathBuf,
}

/// Does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTemplateSync;

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl GitTemplateSync {
    /// Creates a sync using `git` from `PATH`.
    pub fn new() -> Self {
        Self {
            git: PathBuf::from("git"),
        }
    }

    /// Creates a sync using a specific git binary.
    pub fn with_binary(git: impl Into<PathBuf>) -> Self {
        Self { git: git.into() }
    }

    async fn git(&self, repo_url: &str, args: &[&str]) -> DeckResult<()> {
        tracing::debug!("running: git {}", args.join(" "));
        let output = Command::new(&self.git)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| DeckError::TemplateSync {
                repo: repo_url.to_string(),
                diagnostic: format!("failed to run git: {}", e),
            })?;

        if !output.status.success() {
            return Err(DeckError::TemplateSync {
                repo: repo_url.to_string(),
                diagnostic: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for GitTemplateSync {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TemplateSync for GitTemplateSync {
    async fn sync_templates(&self, repo_url: &str, branch: &str, dest: &Path) -> DeckResult<()> {
        let dest_arg = dest.display().to_string();
        let has_checkout = fs::try_exists(dest.join(GIT_DIR))
            .await
            .map_err(|e| DeckError::fs(dest, e))?;

        if has_checkout {
            tracing::info!("updating templates from {} ({})", repo_url, branch);
            let remote_branch = format!("origin/{}", branch);
            self.git(repo_url, &["-C", &dest_arg, "remote", "set-url", "origin", repo_url])
                .await?;
            self.git(repo_url, &["-C", &dest_arg, "fetch", "--depth", "1", "origin", branch])
                .await?;
            self.git(repo_url, &["-C", &dest_arg, "reset", "--hard", &remote_branch])
                .await?;
            self.git(repo_url, &["-C", &dest_arg, "clean", "-fdx"]).await?;
            return Ok(());
        }

        // Templates are a mirror, so anything already there without a checkout is replaced.
        match fs::remove_dir_all(dest).await {
            Ok(()) => tracing::debug!("replaced {}", dest.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(DeckError::fs(dest, e)),
        }

        tracing::info!("cloning templates from {} ({})", repo_url, branch);
        self.git(
            repo_url,
            &["clone", "--depth", "1", "--branch", branch, repo_url, &dest_arg],
        )
        .await
    }
}

#[async_trait]
impl TemplateSync for NoopTemplateSync {
    async fn sync_templates(&self, repo_url: &str, _branch: &str, dest: &Path) -> DeckResult<()> {
        tracing::info!(
            "template sync disabled, leaving {} untouched (repo {})",
            dest.display(),
            repo_url
        );
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Picks the template sync named in the configuration.
pub fn template_sync_from_config(config: &DeckConfig) -> Arc<dyn TemplateSync> {
    match config.get_template_sync() {
        TemplateSyncKind::Git => Arc::new(GitTemplateSync::new()),
        TemplateSyncKind::Disabled => Arc::new(NoopTemplateSync),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_sync_leaves_destination_alone() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("keep.txt"), "keep").unwrap();

        NoopTemplateSync
            .sync_templates("https://example.com/templates.git", "main", dir.path())
            .await
            .unwrap();
        assert!(dir.path().join("keep.txt").exists());
    }

    #[tokio::test]
    async fn test_git_sync_reports_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let sync = GitTemplateSync::with_binary("/definitely/not/git");
        let err = sync
            .sync_templates("https://example.com/templates.git", "main", &dir.path().join("templates"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeckError::TemplateSync { repo, .. } if repo.ends_with("templates.git")));
    }
}
