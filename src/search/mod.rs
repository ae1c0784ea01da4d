//! Search orchestration module
//!
//! Fans a place search out over keyword variants, merges and scores the
//! candidates, and caches what survives.

mod executor;
mod models;

pub use executor::{shop_records, Search};
pub use models::*;
