//! Command implementations.

pub mod build;
pub mod match_image;
pub mod search;
pub mod stats;
pub mod watch;
