//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module handles:
//!
//! - Locating the TOML configuration file (`$EDGESHARE_CONFIG` or the
//!   platform config directory).
//! - Writing a default file on first run.
//! - Parsing screens, links and options with sensible defaults for anything
//!   left out.
//!
//! Turning the parsed file into a validated topology is the job of
//! `application::update_layout`, not of this module.

pub mod config;
