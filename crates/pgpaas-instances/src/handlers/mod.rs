//! HTTP handlers for database instances

mod handler;
mod types;

pub use handler::*;
pub use types::*;
