//! API request handlers

mod functions;
mod health;

pub use functions::*;
pub use health::*;
