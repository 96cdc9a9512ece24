use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::{report::OperationReport, resources::Layer};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The kinds of cleanup on offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CleaningKind {
    /// Custom: delete the directory only.
    DirectoryOnly,

    /// Custom: delete the directory and the containers named after it.
    DirectoryAndContainers,

    /// Images: delete containers, image and directory.
    Standard,

    /// Images: like [`Standard`](Self::Standard), then prune the engine's build cache.
    WithBuildCache,
}

/// A cleanup the user can pick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningOption {
    /// What kind of cleanup this is.
    pub kind: CleaningKind,

    /// The layer of the entry.
    pub layer: Layer,

    /// The entry name.
    pub name: String,

    /// The containers that would be removed, as known when the option was computed.
    pub containers: Vec<String>,

    /// The image that would be removed, as known when the option was computed.
    pub image_ref: Option<String>,

    /// Whether deck recommends this option.
    pub recommended: bool,
}

/// The outcome of asking what can be cleaned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CleaningPlan {
    /// Nothing may be cleaned.
    Refused {
        /// Why.
        reason: String,

        /// The production container that blocked the cleanup, if that was the reason.
        production_container: Option<String>,

        /// What the user can do instead.
        hints: Vec<String>,
    },

    /// The options to pick from, recommended first.
    Options(Vec<CleaningOption>),
}

/// The outcome of a cleanup.
///
/// `cleaned_resources` and `skipped_resources` list every sub-step individually, in the order
/// the steps were reached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningResult {
    /// True if every planned step succeeded.
    pub success: bool,

    /// A human-readable summary.
    pub message: String,

    /// Resources that were deleted.
    pub cleaned_resources: Vec<String>,

    /// Resources that were not deleted, with the reason.
    pub skipped_resources: Vec<String>,

    /// Follow-up commands.
    pub hints: Vec<String>,

    /// True if the production guard stopped the cleanup.
    pub refused: bool,

    /// True if the user declined or the operation was cancelled.
    pub cancelled: bool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl CleaningKind {
    /// Whether containers are removed.
    pub fn removes_containers(&self) -> bool {
        !matches!(self, Self::DirectoryOnly)
    }

    /// Whether the engine image is removed.
    pub fn removes_image(&self) -> bool {
        matches!(self, Self::Standard | Self::WithBuildCache)
    }

    /// Whether the build cache is pruned.
    pub fn prunes_build_cache(&self) -> bool {
        matches!(self, Self::WithBuildCache)
    }
}

impl CleaningOption {
    /// A one-line description for menus.
    pub fn description(&self) -> String {
        match self.kind {
            CleaningKind::DirectoryOnly => "delete the directory only".to_string(),
            CleaningKind::DirectoryAndContainers => format!(
                "delete the directory and {} container(s)",
                self.containers.len()
            ),
            CleaningKind::Standard => format!(
                "delete {} container(s), the image and the directory (recommended)",
                self.containers.len()
            ),
            CleaningKind::WithBuildCache => format!(
                "delete {} container(s), the image, the directory and the build cache (not recommended: rebuilds re-fetch every dependency)",
                self.containers.len()
            ),
        }
    }
}

impl CleaningResult {
    /// Converts the result into the common report shape.
    pub fn to_report(&self) -> OperationReport {
        let report = if self.success {
            OperationReport::success(self.message.clone())
        } else {
            OperationReport::failure(self.message.clone())
        };
        report.with_hints(self.hints.clone())
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Display for CleaningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirectoryOnly => write!(f, "directory-only"),
            Self::DirectoryAndContainers => write!(f, "directory-and-containers"),
            Self::Standard => write!(f, "standard"),
            Self::WithBuildCache => write!(f, "with-build-cache"),
        }
    }
}

impl Display for CleaningOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}
