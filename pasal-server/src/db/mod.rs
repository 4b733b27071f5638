//! Database access layer

pub mod cart;
pub mod catalog;
pub mod orders;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;
