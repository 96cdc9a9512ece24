//! The container lifecycle of an Images entry.
//!
//! [`SmartStarter`] decides between attaching, restarting, creating or rebuilding, based on
//! what the engine reports for the entry's name. The decision itself is the pure
//! [`decide`] function; everything else is carrying it out.

mod progress;
mod starter;
mod state;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use progress::*;
pub use starter::*;
pub use state::*;
