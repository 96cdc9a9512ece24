//! Configuration types and helpers.

mod deck;
mod defaults;
mod port_pair;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use deck::*;
pub use defaults::*;
pub use port_pair::*;
