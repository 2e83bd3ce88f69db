//! Weave - structural source rewriter for threading a context handle
//! through function bodies and call sites.
//!
//! This library provides the core functionality for weave, including:
//! - Configuration file parsing and cascade discovery
//! - Token templates with named slots, anchored signature matching
//! - Body injection, call-site argument rewrites and template substitutions
//! - An ordered rule registry and a driver that writes each file at most once
//!
//! # Example
//!
//! ```no_run
//! use weave_cli::config::load_merged_config;
//! use weave_cli::driver::Driver;
//! use weave_cli::rules::compile_rules;
//! use std::path::Path;
//!
//! let cwd = std::env::current_dir().unwrap();
//! let config = load_merged_config(&cwd).unwrap();
//! let registry = compile_rules(&config).unwrap();
//!
//! let report = Driver::new(&registry)
//!     .run(Path::new("src/usecase/send.go"))
//!     .unwrap();
//! print!("{}", report);
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod rules;

pub use error::{Result, WeaveError};
