use crate::error::WeaveError;
use serde::Deserialize;
use std::path::PathBuf;

/// Top-level configuration from a `.weave.toml` file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
	/// If true, stop directory cascade and jump directly to ~/.weave.toml.
	#[serde(default)]
	pub root: bool,

	/// Environment variable name that, if truthy, skips ~/.weave.toml lookup.
	/// Useful for CI environments.
	#[serde(default)]
	pub root_config_lookup_disable_env_var: Option<String>,

	/// File to rewrite, relative to this config file's directory.
	#[serde(default)]
	pub target: Option<PathBuf>,

	/// Build or check command to suggest after a successful rewrite.
	#[serde(default)]
	pub verify_hint: Option<String>,

	/// Rewrite rules, applied in order.
	#[serde(default)]
	pub rules: Vec<Rule>,
}

/// What a rule does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleKind {
	/// Inject statements between a function signature and its first statement.
	#[default]
	Inject,

	/// Insert an argument into every matching call.
	InsertArg,

	/// Replace one argument of every matching call.
	ReplaceArg,

	/// Template rewrite, first match only unless global.
	Rewrite,
}

impl RuleKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			RuleKind::Inject => "inject",
			RuleKind::InsertArg => "insert-arg",
			RuleKind::ReplaceArg => "replace-arg",
			RuleKind::Rewrite => "rewrite",
		}
	}

	/// Fields this kind must have, and fields it may have.
	fn fields(&self) -> (&'static [&'static str], &'static [&'static str]) {
		match self {
			RuleKind::Inject => (&["signature", "anchor", "body"], &[]),
			RuleKind::InsertArg => (&["callee", "arg"], &["leading"]),
			RuleKind::ReplaceArg => (&["callee", "index", "to"], &["from"]),
			RuleKind::Rewrite => (
				&[],
				&["pattern", "replacement", "global", "substitution"],
			),
		}
	}
}

/// A rewrite rule as written in the config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct Rule {
	/// Unique name, printed when the rule fires.
	pub name: String,

	pub kind: RuleKind,

	#[serde(default)]
	pub description: Option<String>,

	/// Names of rules that must run before this one.
	#[serde(default)]
	pub after: Vec<String>,

	/// Signature template (inject).
	pub signature: Option<String>,

	/// Template of the statement that must directly follow the signature (inject).
	pub anchor: Option<String>,

	/// Lines to inject; leading tabs nest a line one level deeper (inject).
	pub body: Option<Vec<String>>,

	/// Dotted callee path, e.g. `service.uploadMedia` (insert-arg, replace-arg).
	pub callee: Option<String>,

	/// Arguments that must open the call (insert-arg).
	pub leading: Option<Vec<String>>,

	/// Argument to insert after `leading` (insert-arg).
	pub arg: Option<String>,

	/// Zero-based argument position (replace-arg).
	pub index: Option<usize>,

	/// Only replace the argument where it currently reads this (replace-arg).
	pub from: Option<String>,

	/// New argument text (replace-arg).
	pub to: Option<String>,

	/// Match template (rewrite).
	pub pattern: Option<String>,

	/// Replacement with `${slot}` references (rewrite).
	pub replacement: Option<String>,

	/// Rewrite every occurrence instead of the first (rewrite).
	pub global: Option<bool>,

	/// sed-like shorthand "s|pattern|replacement|g" (rewrite).
	/// Mutually exclusive with pattern, replacement and global.
	pub substitution: Option<String>,
}

impl Rule {
	fn set_fields(&self) -> [(&'static str, bool); 13] {
		[
			("signature", self.signature.is_some()),
			("anchor", self.anchor.is_some()),
			("body", self.body.is_some()),
			("callee", self.callee.is_some()),
			("leading", self.leading.is_some()),
			("arg", self.arg.is_some()),
			("index", self.index.is_some()),
			("from", self.from.is_some()),
			("to", self.to.is_some()),
			("pattern", self.pattern.is_some()),
			("replacement", self.replacement.is_some()),
			("global", self.global.is_some()),
			("substitution", self.substitution.is_some()),
		]
	}

	/// Validate that the fields set match the rule's kind.
	pub fn validate(&self) -> Result<(), WeaveError> {
		let kind = self.kind.as_str();
		let fields = self.set_fields();
		let (required, optional) = self.kind.fields();

		if let Some(&(field, _)) = fields
			.iter()
			.find(|(field, set)| *set && !required.contains(field) && !optional.contains(field))
		{
			return Err(WeaveError::UnexpectedField {
				rule: self.name.clone(),
				kind,
				field,
			});
		}

		let is_set = |name: &str| fields.iter().any(|(field, set)| *field == name && *set);
		if let Some(field) = required.iter().copied().find(|field| !is_set(field)) {
			return Err(WeaveError::MissingField {
				rule: self.name.clone(),
				kind,
				field,
			});
		}

		if self.kind == RuleKind::Rewrite {
			if self.substitution.is_some() {
				if let Some(other) = ["pattern", "replacement", "global"]
					.into_iter()
					.find(|field| is_set(field))
				{
					return Err(WeaveError::MutuallyExclusive {
						rule: self.name.clone(),
						option1: "substitution",
						option2: other,
					});
				}
			} else if let Some(field) = ["pattern", "replacement"]
				.into_iter()
				.find(|field| !is_set(field))
			{
				return Err(WeaveError::MissingField {
					rule: self.name.clone(),
					kind,
					field,
				});
			}
		}

		Ok(())
	}
}

impl Config {
	/// Validate all rules in this config.
	pub fn validate(&self) -> Result<(), WeaveError> {
		for rule in &self.rules {
			rule.validate()?;
		}
		Ok(())
	}
}

/// A loaded configuration with its source path for debugging/display.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
	/// The parsed configuration.
	pub config: Config,

	/// The path this config was loaded from.
	pub path: PathBuf,
}

/// Merged configuration from multiple config files in the cascade.
#[derive(Debug, Clone, Default)]
pub struct MergedConfig {
	/// All rules, outermost config first, in declaration order.
	pub rules: Vec<RuleWithSource>,

	/// Target file from the nearest config that names one, resolved against
	/// that config's directory.
	pub target: Option<PathBuf>,

	/// Verification hint from the nearest config that has one.
	pub verify_hint: Option<String>,
}

/// A rule with its source config path for debugging/display.
#[derive(Debug, Clone)]
pub struct RuleWithSource {
	/// The rule itself.
	pub rule: Rule,

	/// The config file this rule came from.
	pub source: PathBuf,
}
