//! MMIF Interchange Documents
//!
//! The document accumulator, its data models and its wire format.

mod document;
mod models;
mod references;
mod wire;

pub use document::Mmif;
pub use models::*;
