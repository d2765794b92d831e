//! # Resound Common
//!
//! Common types shared by every Resound layer.
//!
//! This crate provides:
//! - ID and handle types (clips, voices, leased player slots)
//! - The sound category and volume hierarchy
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod ids;
pub mod volume;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::*;
    pub use crate::ids::*;
    pub use crate::volume::*;
}

pub use prelude::*;
