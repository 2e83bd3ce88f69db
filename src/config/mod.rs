//! Configuration loading and parsing for weave.
//!
//! This module handles:
//! - TOML config file parsing and per-kind rule validation
//! - Directory cascade discovery
//! - Config merging
//! - The starter config written by `weave --init`

pub mod cascade;
pub mod init;
pub mod parser;
pub mod types;

pub use cascade::{
	CONFIG_FILE_NAME, discover_configs, load_config_file, load_merged_config, merge_configs,
	user_config_path,
};
pub use init::generate_init_template;
pub use parser::{parse_config_file, parse_config_str};
pub use types::{Config, LoadedConfig, MergedConfig, Rule, RuleKind, RuleWithSource};
