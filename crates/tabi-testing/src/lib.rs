//! Test utilities for Tabi services.
//!
//! Import from `[dev-dependencies]` only.

pub mod auth;
