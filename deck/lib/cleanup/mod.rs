//! Cascading cleanup across the three layers.
//!
//! Deleting an Images entry takes its containers, its engine image and its directory with it,
//! in that order. A container named `{entry}-prod` or `{entry}-production`, in any state, stops
//! the whole operation before anything is deleted.

mod cleaner;
mod option;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use cleaner::*;
pub use option::*;
