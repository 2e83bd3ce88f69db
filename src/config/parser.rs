use crate::config::types::Config;
use crate::error::{Result, WeaveError};
use std::path::Path;

/// Parse a config file from the given path.
pub fn parse_config_file(path: &Path) -> Result<Config> {
	let content = std::fs::read_to_string(path).map_err(|source| WeaveError::ConfigReadError {
		path: path.to_path_buf(),
		source,
	})?;

	parse_config_str(&content, path)
}

/// Parse a config from a string (useful for testing).
pub fn parse_config_str(content: &str, path: &Path) -> Result<Config> {
	let config: Config =
		toml::from_str(content).map_err(|source| WeaveError::ConfigParseError {
			path: path.to_path_buf(),
			source,
		})?;

	config.validate()?;

	Ok(config)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::types::RuleKind;
	use std::path::PathBuf;

	fn parse(content: &str) -> Result<Config> {
		parse_config_str(content, &PathBuf::from("test.toml"))
	}

	#[test]
	fn test_parse_empty_config() {
		let config = parse("").unwrap();

		assert!(!config.root);
		assert!(config.root_config_lookup_disable_env_var.is_none());
		assert!(config.target.is_none());
		assert!(config.verify_hint.is_none());
		assert!(config.rules.is_empty());
	}

	#[test]
	fn test_parse_basic_config() {
		let content = r#"
root = true
root-config-lookup-disable-env-var = "CI"
target = "src/usecase/send.go"
verify-hint = "go build ./..."
"#;
		let config = parse(content).unwrap();

		assert!(config.root);
		assert_eq!(
			config.root_config_lookup_disable_env_var,
			Some("CI".to_string())
		);
		assert_eq!(config.target, Some(PathBuf::from("src/usecase/send.go")));
		assert_eq!(config.verify_hint, Some("go build ./...".to_string()));
	}

	#[test]
	fn test_parse_every_rule_kind() {
		let content = r#"
[[rules]]
name = "SendImage"
kind = "inject"
signature = "func (s S) SendImage(ctx context.Context, request ${kind}Request) {"
anchor = "err = validations."
body = ["client, err := s.getClient()", "if err != nil {", "\treturn", "}"]

[[rules]]
name = "uploadMedia"
kind = "insert-arg"
callee = "service.uploadMedia"
leading = ["ctx"]
arg = "client"
after = ["SendImage"]

[[rules]]
name = "ValidateJid"
kind = "replace-arg"
callee = "utils.ValidateJidWithLogin"
index = 0
from = "whatsapp.GetClient()"
to = "client"

[[rules]]
name = "poll"
kind = "rewrite"
substitution = "s|whatsapp.GetClient().BuildPollCreation|client.BuildPollCreation|g"
"#;
		let config = parse(content).unwrap();
		let kinds: Vec<_> = config.rules.iter().map(|r| r.kind).collect();
		assert_eq!(
			kinds,
			vec![
				RuleKind::Inject,
				RuleKind::InsertArg,
				RuleKind::ReplaceArg,
				RuleKind::Rewrite
			]
		);

		let inject = &config.rules[0];
		assert_eq!(inject.body.as_ref().unwrap()[2], "\treturn");

		let insert = &config.rules[1];
		assert_eq!(insert.after, vec!["SendImage".to_string()]);
		assert_eq!(insert.leading, Some(vec!["ctx".to_string()]));

		assert_eq!(config.rules[2].index, Some(0));
	}

	#[test]
	fn test_missing_required_field() {
		let content = r#"
[[rules]]
name = "half"
kind = "insert-arg"
callee = "service.uploadMedia"
"#;
		match parse(content).unwrap_err() {
			WeaveError::MissingField { rule, kind, field } => {
				assert_eq!(rule, "half");
				assert_eq!(kind, "insert-arg");
				assert_eq!(field, "arg");
			}
			other => panic!("Expected MissingField error, got {other:?}"),
		}
	}

	#[test]
	fn test_field_from_another_kind() {
		let content = r#"
[[rules]]
name = "mixed"
kind = "replace-arg"
callee = "f"
index = 1
to = "client"
leading = ["ctx"]
"#;
		match parse(content).unwrap_err() {
			WeaveError::UnexpectedField { field, .. } => assert_eq!(field, "leading"),
			other => panic!("Expected UnexpectedField error, got {other:?}"),
		}
	}

	#[test]
	fn test_mutually_exclusive_rewrite_options() {
		let content = r#"
[[rules]]
name = "both"
kind = "rewrite"
substitution = "s/a/b/"
pattern = "a"
"#;
		match parse(content).unwrap_err() {
			WeaveError::MutuallyExclusive {
				option1, option2, ..
			} => {
				assert_eq!(option1, "substitution");
				assert_eq!(option2, "pattern");
			}
			other => panic!("Expected MutuallyExclusive error, got {other:?}"),
		}
	}

	#[test]
	fn test_rewrite_needs_pattern_and_replacement() {
		let content = r#"
[[rules]]
name = "lonely"
kind = "rewrite"
pattern = "a"
"#;
		assert!(matches!(
			parse(content),
			Err(WeaveError::MissingField {
				field: "replacement",
				..
			})
		));
	}

	#[test]
	fn test_unknown_keys_rejected() {
		let content = r#"
[[rules]]
name = "typo"
kind = "insert-arg"
callee = "f"
arg = "x"
leadin = ["ctx"]
"#;
		assert!(matches!(
			parse(content),
			Err(WeaveError::ConfigParseError { .. })
		));
	}

	#[test]
	fn test_unknown_kind_rejected() {
		let content = r#"
[[rules]]
name = "odd"
kind = "delete"
"#;
		assert!(matches!(
			parse(content),
			Err(WeaveError::ConfigParseError { .. })
		));
	}
}
