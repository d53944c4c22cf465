//! Session types shared by the Tabi auth service and its tests.
//!
//! Provides session JWT issuing/verification, the session cookie builders, and the
//! `SessionIdentity` extractor.

pub mod cookie;
pub mod identity;
pub mod token;
