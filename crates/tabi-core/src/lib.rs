//! Shared plumbing for Tabi services: probes, request ids, tracing and serde helpers.

pub mod health;
pub mod middleware;
pub mod serde;
pub mod tracing;
