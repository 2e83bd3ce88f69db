use std::path::PathBuf;

/// Library-level structured errors for weave.
///
/// Use `thiserror` for structured errors that library consumers can match on.
/// The CLI binary wraps these with `anyhow` for rich context chains.
///
/// A rule that finds nothing to rewrite is not an error: it shows up as a
/// skipped [`RuleOutcome`](crate::driver::RuleOutcome).
#[derive(Debug, thiserror::Error)]
pub enum WeaveError {
	#[error("Cannot read source file: {path}")]
	ResourceUnavailable {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to write rewritten source: {path}")]
	WriteFailure {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to read config file: {path}")]
	ConfigReadError {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to parse config file: {path}")]
	ConfigParseError {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("Rule '{rule}' of kind {kind} requires `{field}`")]
	MissingField {
		rule: String,
		kind: &'static str,
		field: &'static str,
	},

	#[error("Rule '{rule}' of kind {kind} does not accept `{field}`")]
	UnexpectedField {
		rule: String,
		kind: &'static str,
		field: &'static str,
	},

	#[error("Rule '{rule}' sets mutually exclusive options: {option1} and {option2}")]
	MutuallyExclusive {
		rule: String,
		option1: &'static str,
		option2: &'static str,
	},

	#[error("No target file given and no config names one")]
	NoTarget,

	#[error("Invalid template `{template}`: {reason}")]
	InvalidTemplate { template: String, reason: String },

	#[error("Rule '{rule}' references unknown slot `{slot}`")]
	UnknownSlot { rule: String, slot: String },

	#[error("Rule name '{name}' is declared more than once")]
	DuplicateRule { name: String },

	#[error("Rule '{rule}' runs after unknown rule '{dependency}'")]
	UnknownDependency { rule: String, dependency: String },

	#[error("Rule dependencies form a cycle: {}", rules.join(" -> "))]
	DependencyCycle { rules: Vec<String> },

	#[error("Rule '{rule}' would match its own replacement and is not idempotent")]
	NonIdempotentRule { rule: String },

	#[error("Failed to resolve home directory")]
	HomeDirectoryNotFound,
}

/// Result type alias using WeaveError.
pub type Result<T> = std::result::Result<T, WeaveError>;
