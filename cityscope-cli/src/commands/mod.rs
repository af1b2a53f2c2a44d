//! Command implementations.

pub mod common;
pub mod config;
pub mod extract;
pub mod layers;
pub mod sync;
