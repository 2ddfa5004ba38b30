//! Buffer module for incremental body accumulation
//!
//! This module provides:
//! - A growable byte buffer with amortized doubling growth
//! - Prefix consumption with compaction of the consumed space

pub mod growable;

pub use growable::{BufferStats, GrowableBuffer, DEFAULT_CAPACITY};
