//! Trellis CLI
//!
//! Command surface over the pipeline, store, and synchronizer crates.

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod output;
