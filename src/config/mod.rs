//! Configuration module for the syncer
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use ord_syncer::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("syncer.toml")).unwrap();
//! println!("Syncing from {}", config.source.base_url);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{Config, OutputConfig, SourceConfig, SyncerConfig, UserAgentConfig};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
