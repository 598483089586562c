//! CLAMS Core
//!
//! Manifest model, interchange document accumulator, and the helpers that
//! sit around them (workflow sources, rewinding, the app runner).

pub mod app;
pub mod appmetadata;
pub mod mmif;
pub mod rewind;
pub mod settings;
pub mod source;
pub mod vocab;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;
