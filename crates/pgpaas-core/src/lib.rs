//! Core types shared across the pgpaas crates

pub mod error;
pub mod error_builder;
pub mod openapi;
pub mod problemdetails;
pub use problemdetails::ProblemDetails;

// Re-export commonly used types
pub use error::*;
pub use error_builder::*;
