//! The directory-backed three-layer resource model.
//!
//! ```text
//! .deck/
//!   templates/<name>/   synced from a remote repository, read-only
//!   custom/<name>/      user-editable copies of templates
//!   images/<name>/      timestamped build records, immutable apart from `.deck-metadata`
//! ```
//!
//! The name of an Images entry is the correlation key to the engine's image and containers.

mod layer;
mod manager;
mod metadata;
mod naming;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use layer::*;
pub use manager::*;
pub use metadata::*;
pub use naming::*;
