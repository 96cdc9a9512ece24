//! `deck` orchestrates local development environments on Podman or Docker.
//!
//! # Overview
//!
//! Every environment lives in one of three layers under a project's `.deck` directory:
//!
//! - **Templates**: read-only blueprints synced from a remote repository
//! - **Custom**: editable copies of templates
//! - **Images**: timestamped, immutable build records frozen from custom entries
//!
//! An entry is promoted Templates → Custom → Images, and an Images entry is what gets built
//! and run. deck never owns engine state: containers and images are always read back from the
//! engine and correlated with entries by name.
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use deck::{
//!     lifecycle::TracingProgress,
//!     management::Deck,
//!     resources::Layer,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let deck = Deck::open(".").await?;
//!
//!     // Freeze a custom configuration and start it
//!     let image = deck.promote(Layer::Custom, "nodejs-app").await?;
//!     let outcome = deck
//!         .starter()
//!         .smart_start(&image.name, &TracingProgress, &CancellationToken::new())
//!         .await?;
//!     println!("{}", outcome.report.message);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`resources`] - The three layers and the directory manager
//! - [`engine`] - The container engine boundary and its CLI adapters
//! - [`lifecycle`] - Smart start, stop and restart of image entries
//! - [`ports`] - Port conflict detection and allocation
//! - [`catalog`] - The unified view over directories and engine state
//! - [`cleanup`] - Cascading cleanup with the production guard
//! - [`integrations`] - Template sync, builds and terminal prompts
//! - [`management`] - Project initialization and component wiring
//! - [`cli`] - Command-line arguments and styling

#![warn(missing_docs)]

mod error;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub mod catalog;
pub mod cleanup;
pub mod cli;
pub mod config;
pub mod engine;
pub mod integrations;
pub mod lifecycle;
pub mod management;
pub mod ports;
pub mod report;
pub mod resources;
pub mod utils;

pub use error::*;
