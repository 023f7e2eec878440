//! Utilities shared between all crates in this workspace.

mod ci;

pub use ci::{CiMetadata, CiPlatform, GitRefType};
