//! CLI command implementations for pg-introspect-api.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: Configuration and database connectivity validation
//! - `config`: Configuration file generation

pub mod check;
pub mod config;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
