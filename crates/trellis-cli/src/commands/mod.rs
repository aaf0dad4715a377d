//! Command implementations.

pub mod index;
pub mod info;
pub mod query;
pub mod rankings;
pub mod search;
pub mod stats;
pub mod visualize;
pub mod watch;
