//! Utility functions for the application

pub mod file;
pub mod string;
pub mod time;
