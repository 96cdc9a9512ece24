use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::engine::{ContainerRecord, ImageRecord};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The engine objects correlated with a directory entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRelationship {
    /// The entry name.
    pub entry_name: String,

    /// The correlated image reference.
    pub image_ref: Option<String>,

    /// The correlated containers, exact match first, then in suffix order.
    pub container_names: Vec<String>,
}

/// How a name was matched against an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NameMatch {
    /// The names are equal.
    Exact,

    /// The name is `{entry}-{suffix}`, with the suffix at this position in the configured order.
    Suffix(usize),
}

/// Matches names against entries with a fixed list of environment suffixes.
///
/// Names that are themselves entries are never claimed through a suffix, so entries `app` and
/// `app-dev` don't fight over a container named `app-dev`.
#[derive(Debug, Clone)]
pub struct NameMatcher<'a> {
    suffixes: &'a [String],
    entry_names: HashSet<&'a str>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ResourceRelationship {
    /// Returns true if nothing in the engine is related to the entry.
    pub fn is_empty(&self) -> bool {
        self.image_ref.is_none() && self.container_names.is_empty()
    }
}

impl<'a> NameMatcher<'a> {
    /// Creates a matcher. `entry_names` are the names of all entries being correlated.
    pub fn new(suffixes: &'a [String], entry_names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            suffixes,
            entry_names: entry_names.into_iter().collect(),
        }
    }

    /// Matches `candidate` against `entry`.
    pub fn matches(&self, entry: &str, candidate: &str) -> Option<NameMatch> {
        if candidate == entry {
            return Some(NameMatch::Exact);
        }

        if self.entry_names.contains(candidate) {
            return None;
        }

        let suffix = candidate.strip_prefix(entry)?.strip_prefix('-')?;
        self.suffixes
            .iter()
            .position(|s| s == suffix)
            .map(NameMatch::Suffix)
    }

    /// The containers belonging to `entry`, exact match first, then by suffix order.
    pub fn containers<'c>(&self, entry: &str, containers: &'c [ContainerRecord]) -> Vec<&'c ContainerRecord> {
        let mut matched: Vec<(NameMatch, &ContainerRecord)> = containers
            .iter()
            .filter_map(|c| self.matches(entry, &c.name).map(|m| (m, c)))
            .collect();
        matched.sort_by_key(|(m, _)| *m);
        matched.into_iter().map(|(_, c)| c).collect()
    }

    /// The image reference belonging to `entry`: the exact name if present, else the first
    /// suffix match.
    pub fn image<'c>(&self, entry: &str, images: &'c [ImageRecord]) -> Option<&'c str> {
        images
            .iter()
            .flat_map(|image| image.references.iter())
            .filter_map(|reference| {
                let repository = crate::engine::repository_name(reference);
                self.matches(entry, repository).map(|m| (m, reference.as_str()))
            })
            .min_by_key(|(m, _)| *m)
            .map(|(_, reference)| reference)
    }

    /// The full relationship of `entry`.
    pub fn relationship(
        &self,
        entry: &str,
        images: &[ImageRecord],
        containers: &[ContainerRecord],
    ) -> ResourceRelationship {
        ResourceRelationship {
            entry_name: entry.to_string(),
            image_ref: self.image(entry, images).map(String::from),
            container_names: self
                .containers(entry, containers)
                .into_iter()
                .map(|c| c.name.clone())
                .collect(),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
