//! HTTP request handlers.

pub mod download;
pub mod health;
pub mod submit;

pub use download::*;
pub use health::*;
pub use submit::*;
