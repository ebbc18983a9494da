//! Common Utilities and Types Library
//! 
//! This crate provides the cell-level types and bit utilities shared across the
//! eNodeB implementation.

pub mod types;
pub mod utils;

// Re-export commonly used items
pub use types::*;
pub use utils::*;
