//! Monitoring core: target model, status tracking and the engine that owns them.

mod engine;
mod model;
mod tracker;

pub use engine::*;
pub use model::*;
pub use tracker::*;
