use std::{
    fmt::{self, Display},
    path::Path,
    str::FromStr,
};

use chrono::{DateTime, SecondsFormat, Utc};
use getset::Getters;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::{DeckError, DeckResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The `.deck-metadata` record of an Images entry.
///
/// Stored as flat `KEY=VALUE` lines:
///
/// ```text
/// IMAGE_NAME=nodejs-app-20250121-1430
/// CREATED_AT=2025-01-21T14:30:00Z
/// CREATED_BY=alice
/// SOURCE_CONFIG=nodejs-app
/// BUILD_STATUS=built
/// LAST_STARTED=2025-01-21T14:35:12Z
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder, Getters)]
#[getset(get = "pub with_prefix")]
pub struct ImageMetadata {
    /// The name of the Images entry, which is also the engine image name.
    #[builder(setter(into))]
    image_name: String,

    /// When the entry was promoted.
    created_at: DateTime<Utc>,

    /// Who promoted it.
    #[builder(setter(into))]
    created_by: String,

    /// The Custom entry it was promoted from.
    #[builder(setter(into))]
    source_config: String,

    /// Where the image build stands.
    #[builder(default)]
    build_status: BuildStatus,

    /// The last time a container was started for the entry.
    #[builder(default, setter(strip_option))]
    last_started: Option<DateTime<Utc>>,
}

/// Where the build of an Images entry stands.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    /// Promoted, never built.
    #[default]
    Prepared,

    /// A build is in progress.
    Building,

    /// The image was built.
    Built,

    /// The last build failed.
    Failed,
}

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const KEY_IMAGE_NAME: &str = "IMAGE_NAME";
const KEY_CREATED_AT: &str = "CREATED_AT";
const KEY_CREATED_BY: &str = "CREATED_BY";
const KEY_SOURCE_CONFIG: &str = "SOURCE_CONFIG";
const KEY_BUILD_STATUS: &str = "BUILD_STATUS";
const KEY_LAST_STARTED: &str = "LAST_STARTED";

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ImageMetadata {
    /// Sets the build status.
    pub fn set_build_status(&mut self, status: BuildStatus) {
        self.build_status = status;
    }

    /// Records a container start.
    pub fn set_last_started(&mut self, at: DateTime<Utc>) {
        self.last_started = Some(at);
    }

    /// Parses the contents of a metadata file. `path` is only used in errors.
    ///
    /// Blank lines, `#` comments and unknown keys are ignored.
    pub fn parse(contents: &str, path: &Path) -> DeckResult<Self> {
        let invalid = |reason: String| DeckError::InvalidMetadata {
            path: path.to_path_buf(),
            reason,
        };

        let mut image_name = None;
        let mut created_at = None;
        let mut created_by = None;
        let mut source_config = None;
        let mut build_status = None;
        let mut last_started = None;

        for (number, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| invalid(format!("line {} is not KEY=VALUE", number + 1)))?;
            let value = value.trim();

            match key.trim() {
                KEY_IMAGE_NAME => image_name = Some(value.to_string()),
                KEY_CREATED_AT => created_at = Some(parse_time(value).map_err(&invalid)?),
                KEY_CREATED_BY => created_by = Some(value.to_string()),
                KEY_SOURCE_CONFIG => source_config = Some(value.to_string()),
                KEY_BUILD_STATUS => build_status = Some(value.parse::<BuildStatus>().map_err(&invalid)?),
                KEY_LAST_STARTED if !value.is_empty() => {
                    last_started = Some(parse_time(value).map_err(&invalid)?)
                }
                _ => {}
            }
        }

        Ok(Self {
            image_name: image_name.ok_or_else(|| invalid(format!("missing {}", KEY_IMAGE_NAME)))?,
            created_at: created_at.ok_or_else(|| invalid(format!("missing {}", KEY_CREATED_AT)))?,
            created_by: created_by.unwrap_or_default(),
            source_config: source_config.unwrap_or_default(),
            build_status: build_status.unwrap_or_default(),
            last_started,
        })
    }

    /// Renders the metadata file contents.
    pub fn to_file_contents(&self) -> String {
        let mut contents = format!(
            "{}={}\n{}={}\n{}={}\n{}={}\n{}={}\n",
            KEY_IMAGE_NAME,
            self.image_name,
            KEY_CREATED_AT,
            format_time(&self.created_at),
            KEY_CREATED_BY,
            self.created_by,
            KEY_SOURCE_CONFIG,
            self.source_config,
            KEY_BUILD_STATUS,
            self.build_status,
        );

        if let Some(last_started) = &self.last_started {
            contents.push_str(&format!("{}={}\n", KEY_LAST_STARTED, format_time(last_started)));
        }

        contents
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn parse_time(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp '{}': {}", value, e))
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prepared => write!(f, "prepared"),
            Self::Building => write!(f, "building"),
            Self::Built => write!(f, "built"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for BuildStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prepared" => Ok(Self::Prepared),
            "building" => Ok(Self::Building),
            "built" => Ok(Self::Built),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown build status '{}'", other)),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
