//! Database module for sitewatch.
//!
//! SQLite storage for check and alert history.

mod store;

pub use store::*;
