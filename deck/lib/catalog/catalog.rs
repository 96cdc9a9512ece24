use std::{
    fmt::{self, Display},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::{
    config::DeckConfig,
    engine::{ContainerEngine, ContainerRecord, ImageRecord},
    resources::{DirectoryManager, Layer, ResourceEntry},
    DeckResult,
};

use super::{NameMatcher, ResourceRelationship};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The environment filter value that means "no filter".
pub const UNKNOWN_ENV: &str = "unknown";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Builds [`UnifiedResourceList`]s. Never changes anything on disk or in the engine.
pub struct ResourceCatalog {
    engine: Arc<dyn ContainerEngine>,
    directories: DirectoryManager,
    config: DeckConfig,
}

/// Where a resource stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceStatus {
    /// Complete, nothing in the engine yet.
    Ready,

    /// Missing required files.
    Unavailable,

    /// The image exists, no container.
    ImageBuilt,

    /// At least one related container is running.
    Running,

    /// Related containers exist, none running.
    Stopped,
}

/// One row of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnifiedResource {
    /// The entry name.
    pub name: String,

    /// The entry layer.
    pub layer: Layer,

    /// Where the resource stands.
    pub status: ResourceStatus,

    /// The correlated image reference.
    pub related_image_ref: Option<String>,

    /// The correlated containers.
    pub related_container_names: Vec<String>,

    /// Whether the entry has every required file.
    pub is_available: bool,

    /// Why the entry is unavailable.
    pub unavailable_reason: Option<String>,
}

/// Everything deck knows about, per layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnifiedResourceList {
    /// Images entries.
    pub images: Vec<UnifiedResource>,

    /// Custom entries.
    pub custom: Vec<UnifiedResource>,

    /// Templates entries.
    pub templates: Vec<UnifiedResource>,

    /// The relationship of every Images and Custom entry that has one.
    pub relationships: Vec<ResourceRelationship>,
}

/// Directory entries of every layer.
struct Entries {
    templates: Vec<ResourceEntry>,
    custom: Vec<ResourceEntry>,
    images: Vec<ResourceEntry>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ResourceCatalog {
    /// Creates a catalog.
    pub fn new(engine: Arc<dyn ContainerEngine>, directories: DirectoryManager, config: DeckConfig) -> Self {
        Self {
            engine,
            directories,
            config,
        }
    }

    /// Builds the catalog.
    ///
    /// Directory listings, engine images and engine containers are read concurrently.
    /// `env_filter` keeps only entries named `{env}-...`; empty and `unknown` mean no filter.
    pub async fn build_catalog(&self, env_filter: Option<&str>) -> DeckResult<UnifiedResourceList> {
        let ((templates, custom, images), engine_images, containers) = tokio::try_join!(
            async {
                tokio::try_join!(
                    self.directories.list_entries(Layer::Templates),
                    self.directories.list_entries(Layer::Custom),
                    self.directories.list_entries(Layer::Images),
                )
            },
            self.engine.list_images(),
            self.engine.list_containers(),
        )?;

        tracing::debug!(
            "catalog: {} templates, {} custom, {} images, {} engine images, {} containers",
            templates.len(),
            custom.len(),
            images.len(),
            engine_images.len(),
            containers.len()
        );

        Ok(assemble(
            &self.config,
            Entries {
                templates,
                custom,
                images,
            },
            &engine_images,
            &containers,
            env_filter,
        ))
    }
}

impl UnifiedResourceList {
    /// Finds a resource by layer and name.
    pub fn find(&self, layer: Layer, name: &str) -> Option<&UnifiedResource> {
        self.layer(layer).iter().find(|r| r.name == name)
    }

    /// The resources of a layer.
    pub fn layer(&self, layer: Layer) -> &[UnifiedResource] {
        match layer {
            Layer::Templates => &self.templates,
            Layer::Custom => &self.custom,
            Layer::Images => &self.images,
        }
    }

    /// The relationship of an entry, if it has one.
    pub fn relationship(&self, name: &str) -> Option<&ResourceRelationship> {
        self.relationships.iter().find(|r| r.entry_name == name)
    }

    /// Returns true if every layer is empty.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.custom.is_empty() && self.templates.is_empty()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Correlates entries with engine objects. Pure.
fn assemble(
    config: &DeckConfig,
    entries: Entries,
    engine_images: &[ImageRecord],
    containers: &[ContainerRecord],
    env_filter: Option<&str>,
) -> UnifiedResourceList {
    let prefix = env_filter
        .map(str::trim)
        .filter(|env| !env.is_empty() && *env != UNKNOWN_ENV)
        .map(|env| format!("{}-", env));
    let keep = |entry: &ResourceEntry| {
        prefix
            .as_ref()
            .map_or(true, |prefix| entry.name.starts_with(prefix.as_str()))
    };

    let image_matcher = NameMatcher::new(
        config.get_env_suffixes(),
        entries.images.iter().map(|e| e.name.as_str()),
    );
    let custom_matcher = NameMatcher::new(
        config.get_env_suffixes(),
        entries.custom.iter().map(|e| e.name.as_str()),
    );

    let mut list = UnifiedResourceList::default();

    for entry in entries.images.iter().filter(|e| keep(e)) {
        let relationship = image_matcher.relationship(&entry.name, engine_images, containers);
        list.images.push(unify(entry, &relationship, containers));
        if !relationship.is_empty() {
            list.relationships.push(relationship);
        }
    }

    // Custom entries are never built into images under their own name; only containers count.
    for entry in entries.custom.iter().filter(|e| keep(e)) {
        let relationship = ResourceRelationship {
            entry_name: entry.name.clone(),
            image_ref: None,
            container_names: custom_matcher
                .containers(&entry.name, containers)
                .into_iter()
                .map(|c| c.name.clone())
                .collect(),
        };
        list.custom.push(unify(entry, &relationship, containers));
        if !relationship.is_empty() {
            list.relationships.push(relationship);
        }
    }

    for entry in entries.templates.iter().filter(|e| keep(e)) {
        list.templates
            .push(unify(entry, &ResourceRelationship::default(), containers));
    }

    list
}

fn unify(entry: &ResourceEntry, relationship: &ResourceRelationship, containers: &[ContainerRecord]) -> UnifiedResource {
    let any_running = containers
        .iter()
        .filter(|c| relationship.container_names.contains(&c.name))
        .any(|c| c.status.is_running());

    let status = if !entry.is_complete() {
        ResourceStatus::Unavailable
    } else if any_running {
        ResourceStatus::Running
    } else if !relationship.container_names.is_empty() {
        ResourceStatus::Stopped
    } else if relationship.image_ref.is_some() {
        ResourceStatus::ImageBuilt
    } else {
        ResourceStatus::Ready
    };

    UnifiedResource {
        name: entry.name.clone(),
        layer: entry.layer,
        status,
        related_image_ref: relationship.image_ref.clone(),
        related_container_names: relationship.container_names.clone(),
        is_available: entry.is_complete(),
        unavailable_reason: entry.unavailable_reason(),
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::Unavailable => write!(f, "unavailable"),
            Self::ImageBuilt => write!(f, "image built"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

impl fmt::Debug for ResourceCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCatalog")
            .field("directories", &self.directories)
            .finish_non_exhaustive()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
