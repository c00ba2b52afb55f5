//! Analysis modules.
//!
//! Statistics derived read-only from a retrieved record table.

pub mod aggregator;

pub use aggregator::*;
