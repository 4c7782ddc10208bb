//! Schema module - Configuration, seeding, and input types.

mod config;
mod pointer;
mod seed;

pub use config::*;
pub use pointer::*;
pub use seed::*;
