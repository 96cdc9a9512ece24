//! Project-level operations: initializing a project and wiring its components together.

mod deck;
mod init;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use deck::*;
pub use init::*;
