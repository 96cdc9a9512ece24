//! Port conflict detection and resolution.
//!
//! Declared ports come from the `*_PORT` keys of a resource's `.env`. Before anything is
//! started they are probed by binding `0.0.0.0:<port>`; an `AddrInUse` means the port is
//! taken, in which case the occupying process is looked up and a free substitute suggested.

mod process;
mod resolver;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use process::*;
pub use resolver::*;
