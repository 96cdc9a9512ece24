use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::{cleanup::CleaningKind, resources::Layer};

use super::styles;

//-------------------------------------------------------------------------------------------------
// Types
//-------------------------------------------------------------------------------------------------

/// deck - template, custom and image development environments on Podman or Docker
#[derive(Debug, Parser)]
#[command(name = "deck", author, about, version, styles=styles::styles())]
pub struct DeckArgs {
    /// The subcommand to run
    #[command(subcommand)]
    pub subcommand: Option<DeckSubcommand>,

    /// Project directory holding `.deck`
    #[arg(short, long, global = true, value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Answer yes to every confirmation
    #[arg(short, long, global = true)]
    pub yes: bool,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
pub enum DeckSubcommand {
    /// Initialize a deck project
    #[command(name = "init")]
    Init {
        /// Directory to initialize, defaults to the current one
        #[arg(value_name = "PATH")]
        dir: Option<PathBuf>,
    },

    /// List templates, custom configurations and images with their engine state
    #[command(name = "list", visible_alias = "ls")]
    List {
        /// Only show entries named `{env}-...`
        #[arg(short, long)]
        env: Option<String>,

        /// Print the catalog as json
        #[arg(long)]
        json: bool,
    },

    /// Manage templates
    #[command(name = "templates")]
    Templates {
        /// The templates subcommand
        #[command(subcommand)]
        subcommand: TemplatesSubcommand,
    },

    /// Manage custom configurations
    #[command(name = "custom")]
    Custom {
        /// The custom subcommand
        #[command(subcommand)]
        subcommand: CustomSubcommand,
    },

    /// Manage image entries
    #[command(name = "images")]
    Images {
        /// The images subcommand
        #[command(subcommand)]
        subcommand: ImagesSubcommand,
    },

    /// Start an image entry, building it if needed
    #[command(name = "start")]
    Start {
        /// The image entry, prompted for if omitted
        name: Option<String>,
    },

    /// Stop the container of an image entry
    #[command(name = "stop")]
    Stop {
        /// The image entry, prompted for if omitted
        name: Option<String>,
    },

    /// Restart the container of an image entry
    #[command(name = "restart")]
    Restart {
        /// The image entry, prompted for if omitted
        name: Option<String>,
    },

    /// Show the logs of an image entry's container
    #[command(name = "logs")]
    Logs {
        /// The image entry
        name: String,

        /// Number of lines to show from the end
        #[arg(long)]
        tail: Option<usize>,
    },

    /// Run a command in an image entry's running container
    #[command(name = "exec")]
    Exec {
        /// The image entry
        name: String,

        /// Attach a terminal
        #[arg(short, long)]
        interactive: bool,

        /// The command and its arguments
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },

    /// Check the declared ports of an entry
    #[command(name = "ports")]
    Ports {
        /// The entry
        name: String,

        /// The layer of the entry
        #[arg(short, long, default_value_t = Layer::Images)]
        layer: Layer,

        /// Write suggested ports into the entry's `.env` (custom entries only)
        #[arg(long)]
        fix: bool,
    },

    /// Delete an entry together with its containers and image
    #[command(name = "clean")]
    Clean {
        /// The layer of the entry
        layer: Layer,

        /// The entry, prompted for if omitted
        name: Option<String>,

        /// The cleanup to run, prompted for if omitted
        #[arg(short, long, value_enum)]
        kind: Option<CleanKind>,
    },
}

/// Templates subcommands
#[derive(Debug, Subcommand)]
pub enum TemplatesSubcommand {
    /// Sync templates from the configured repository
    #[command(name = "update")]
    Update,
}

/// Custom subcommands
#[derive(Debug, Subcommand)]
pub enum CustomSubcommand {
    /// Copy a template into a new custom configuration
    #[command(name = "new")]
    New {
        /// The template, prompted for if omitted
        template: Option<String>,
    },
}

/// Images subcommands
#[derive(Debug, Subcommand)]
pub enum ImagesSubcommand {
    /// Freeze a custom configuration into a timestamped image entry
    #[command(name = "new")]
    New {
        /// The custom configuration, prompted for if omitted
        custom: Option<String>,
    },
}

/// Cleanup kinds accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CleanKind {
    /// Only the directory
    Directory,

    /// The directory and related containers
    Containers,

    /// Containers, image and directory
    Standard,

    /// Everything in standard plus the build cache
    BuildCache,
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl From<CleanKind> for CleaningKind {
    fn from(kind: CleanKind) -> Self {
        match kind {
            CleanKind::Directory => CleaningKind::DirectoryOnly,
            CleanKind::Containers => CleaningKind::DirectoryAndContainers,
            CleanKind::Standard => CleaningKind::Standard,
            CleanKind::BuildCache => CleaningKind::WithBuildCache,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
