//! Integration test utilities for the relay gateway
//!
//! This crate runs the registry end to end: a scriptable protocol connector,
//! local-disk tiers under a temp dir, and real webhook delivery over HTTP.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
