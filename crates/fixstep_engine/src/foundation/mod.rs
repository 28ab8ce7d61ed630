//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Math types and interpolation helpers
//! - Collections and handle types
//! - Time sources and clocks
//! - Seeded randomness and rate metrics
//! - Logging utilities

pub mod collections;
pub mod logging;
pub mod math;
pub mod metrics;
pub mod random;
pub mod time;
