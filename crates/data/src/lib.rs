//! Reference data loading for pack generation and sessions.

pub mod load;

pub use load::*;
