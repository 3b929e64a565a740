//! Helpers shared by every kilo crate.

pub mod error;

pub use error::FromMessage;
