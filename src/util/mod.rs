//! Utility modules

pub mod buffer;
pub mod dump;
pub mod pattern;
pub mod time;
