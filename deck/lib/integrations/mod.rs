//! Collaborators the orchestration core consumes through traits.
//!
//! Each seam has a real implementation and one that does nothing (or works in memory), picked
//! by configuration or by tests.

mod build;
mod prompt;
mod sync;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use build::*;
pub use prompt::*;
pub use sync::*;
