//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the pipeline:
//! - Math types and operations
//! - Bounding volumes
//! - Collections and data structures
//! - Time management
//! - Logging utilities

pub mod math;
pub mod bounds;
pub mod collections;
pub mod time;
pub mod logging;
