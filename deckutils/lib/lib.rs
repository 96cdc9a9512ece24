//! `deckutils` is a library containing general utilities for the deck project.

#![warn(missing_docs)]
#![allow(clippy::module_inception)]

pub mod error;
pub mod fs;
pub mod path;
pub mod term;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use error::*;
pub use fs::*;
pub use path::*;
pub use term::*;
