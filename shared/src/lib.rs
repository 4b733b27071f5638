//! Shared types for the pasal storefront services
//!
//! Common types used across crates: the unified error system, order and
//! catalog models, and small utilities (timestamps, ID generation).

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use http;
pub use serde::{Deserialize, Serialize};
