//! HTTP implementations of the card provider boundary.

pub mod http;
pub mod urls;

pub use http::*;
pub use urls::*;
