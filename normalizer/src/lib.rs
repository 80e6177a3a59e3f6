//! Cloud billing usage normalization
//!
//! - `app` - CLI application wiring
//! - `core` - configuration, CLI and constants
//! - `domain` - usage normalization logic
//! - `utils` - shared helpers

pub mod app;
pub mod core;
pub mod domain;
pub mod utils;
