//! Core pack generation and session logic. Keep this crate free of IO and platform concerns.

pub mod assemble;
pub mod cards;
pub mod colors;
pub mod config;
pub mod pool;
pub mod powerup;
pub mod rng;
pub mod select;
pub mod session;
pub mod source;
pub mod store;

pub use assemble::*;
pub use cards::*;
pub use colors::*;
pub use config::*;
pub use pool::*;
pub use powerup::*;
pub use rng::*;
pub use select::*;
pub use session::*;
pub use source::*;
pub use store::*;
