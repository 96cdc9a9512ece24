//! The unified view over directories, engine images and containers.
//!
//! Correlation is purely by name: an Images entry `app-20250121-1430` owns the engine image of
//! the same name and the containers named exactly that or `app-20250121-1430-{env}`.

mod catalog;
mod relationship;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use catalog::*;
pub use relationship::*;
