use std::{
    fmt::{self, Display},
    path::{Path, PathBuf},
    str::FromStr,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::{
    utils::{BUILD_FILENAMES, COMPOSE_FILENAMES, CUSTOM_SUBDIR, ENV_FILENAME, IMAGES_SUBDIR, TEMPLATES_SUBDIR},
    DeckError, DeckResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// One of the three resource layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    /// Read-only configurations synced from a remote repository.
    Templates,

    /// User-editable configurations.
    Custom,

    /// Timestamped build records, one per engine image.
    Images,
}

/// A file every resource must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequiredFile {
    /// The `.env` file.
    Env,

    /// A compose file.
    Compose,

    /// A `Dockerfile` or `Containerfile`.
    Build,
}

/// The outcome of checking a resource directory for its required files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completeness {
    /// The required files that were found.
    pub present: Vec<PathBuf>,

    /// The required files that are missing.
    pub missing: Vec<RequiredFile>,
}

/// A directory in one of the layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEntry {
    /// The directory name.
    pub name: String,

    /// The layer the entry lives in.
    pub layer: Layer,

    /// The entry directory.
    pub path: PathBuf,

    /// When the directory was created, if the filesystem reports it.
    pub created_at: Option<DateTime<Utc>>,

    /// The required files that were found.
    pub required_files: Vec<PathBuf>,

    /// The required files that are missing.
    pub missing_files: Vec<RequiredFile>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Layer {
    /// Every layer, in promotion order.
    pub const ALL: [Layer; 3] = [Layer::Templates, Layer::Custom, Layer::Images];

    /// The sub directory of `.deck` holding this layer.
    pub fn subdir(&self) -> &'static str {
        match self {
            Self::Templates => TEMPLATES_SUBDIR,
            Self::Custom => CUSTOM_SUBDIR,
            Self::Images => IMAGES_SUBDIR,
        }
    }

    /// The layer an entry of this layer may be promoted to.
    pub fn promotes_to(&self) -> Option<Layer> {
        match self {
            Self::Templates => Some(Self::Custom),
            Self::Custom => Some(Self::Images),
            Self::Images => None,
        }
    }
}

impl RequiredFile {
    /// Every required file kind.
    pub const ALL: [RequiredFile; 3] = [RequiredFile::Env, RequiredFile::Compose, RequiredFile::Build];

    /// Accepted file names, in lookup order.
    pub fn candidates(&self) -> &'static [&'static str] {
        match self {
            Self::Env => &[ENV_FILENAME],
            Self::Compose => COMPOSE_FILENAMES,
            Self::Build => BUILD_FILENAMES,
        }
    }

    /// Returns the first accepted file present in `dir`.
    pub async fn find_in(&self, dir: &Path) -> DeckResult<Option<PathBuf>> {
        for candidate in self.candidates() {
            let path = dir.join(candidate);
            let is_file = match fs::metadata(&path).await {
                Ok(metadata) => metadata.is_file(),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
                Err(e) => return Err(DeckError::fs(&path, e)),
            };

            if is_file {
                return Ok(Some(path));
            }
        }

        Ok(None)
    }
}

impl Completeness {
    /// Checks `dir` for every required file.
    ///
    /// A missing file is recorded, never an error. Only unreadable paths are errors.
    pub async fn check(dir: &Path) -> DeckResult<Self> {
        let mut completeness = Self::default();
        for required in RequiredFile::ALL {
            match required.find_in(dir).await? {
                Some(path) => completeness.present.push(path),
                None => completeness.missing.push(required),
            }
        }

        Ok(completeness)
    }

    /// Returns true if nothing is missing.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

impl ResourceEntry {
    /// Returns true if every required file is present.
    pub fn is_complete(&self) -> bool {
        self.missing_files.is_empty()
    }

    /// A reason the entry can't be used, if any.
    pub fn unavailable_reason(&self) -> Option<String> {
        if self.is_complete() {
            return None;
        }

        let missing: Vec<String> = self.missing_files.iter().map(|f| f.to_string()).collect();
        Some(format!("missing {}", missing.join(", ")))
    }

    /// The compose file of the entry, if present.
    pub fn compose_file(&self) -> Option<&Path> {
        self.present_file(RequiredFile::Compose)
    }

    /// The build file of the entry, if present.
    pub fn build_file(&self) -> Option<&Path> {
        self.present_file(RequiredFile::Build)
    }

    /// The `.env` file of the entry, if present.
    pub fn env_file(&self) -> Option<&Path> {
        self.present_file(RequiredFile::Env)
    }

    fn present_file(&self, kind: RequiredFile) -> Option<&Path> {
        self.required_files
            .iter()
            .find(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| kind.candidates().contains(&name))
            })
            .map(PathBuf::as_path)
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.subdir())
    }
}

impl FromStr for Layer {
    type Err = DeckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "templates" | "template" => Ok(Self::Templates),
            "custom" | "customs" => Ok(Self::Custom),
            "images" | "image" => Ok(Self::Images),
            _ => Err(DeckError::InvalidLayer(s.to_string())),
        }
    }
}

impl Display for RequiredFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Env => write!(f, "{}", ENV_FILENAME),
            Self::Compose => write!(f, "compose file ({})", COMPOSE_FILENAMES.join(" | ")),
            Self::Build => write!(f, "build file ({})", BUILD_FILENAMES.join(" | ")),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
