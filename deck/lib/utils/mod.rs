//! Utility functions and types.

mod cancel;
mod env_file;
mod path;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use cancel::*;
pub use env_file::*;
pub use path::*;
