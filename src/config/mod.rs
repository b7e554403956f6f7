//! Configuration module for hunt
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every setting has a default, so the configuration file is optional.
//!
//! # Example
//!
//! ```no_run
//! use hunt::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("hunt.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CategoryEntry, Config, CrawlerConfig, EngineEntry, OutputConfig, SourceEntry,
    TransportConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
