//! Command handlers for non-interactive subcommands

pub mod config;
pub mod export;
pub mod reset;
pub mod status;
