//! Place, shop and lookup result types
//!
//! Also holds the container that merges candidates coming back from
//! concurrent lookups.

mod container;
mod types;

pub use container::ResultContainer;
pub use types::*;
