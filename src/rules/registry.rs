use crate::config::types::{MergedConfig, Rule, RuleKind, RuleWithSource};
use crate::error::{Result, WeaveError};
use crate::rules::callsite::{InsertArg, ReplaceArg, Snippet};
use crate::rules::edit::Application;
use crate::rules::injector::Injection;
use crate::rules::rewriter::Substitution;
use std::collections::HashSet;
use std::path::PathBuf;

/// What a rule does to the buffer.
#[derive(Debug, Clone)]
pub enum Action {
	Inject(Injection),
	InsertArg(InsertArg),
	ReplaceArg(ReplaceArg),
	Rewrite(Substitution),
}

impl Action {
	/// Compute the edits this action makes to `src`.
	pub fn apply(&self, src: &str) -> Application {
		match self {
			Action::Inject(injection) => injection.apply(src),
			Action::InsertArg(insert) => insert.apply(src),
			Action::ReplaceArg(replace) => replace.apply(src),
			Action::Rewrite(substitution) => substitution.apply(src),
		}
	}

	/// Whether every occurrence is rewritten rather than only the first.
	pub fn is_global(&self) -> bool {
		match self {
			Action::Inject(_) => false,
			Action::InsertArg(_) | Action::ReplaceArg(_) => true,
			Action::Rewrite(substitution) => substitution.global,
		}
	}

	pub fn kind(&self) -> RuleKind {
		match self {
			Action::Inject(_) => RuleKind::Inject,
			Action::InsertArg(_) => RuleKind::InsertArg,
			Action::ReplaceArg(_) => RuleKind::ReplaceArg,
			Action::Rewrite(_) => RuleKind::Rewrite,
		}
	}
}

/// A named, compiled rule. Immutable once registered.
#[derive(Debug, Clone)]
pub struct RewriteRule {
	pub name: String,

	pub description: Option<String>,

	/// Rules that must run before this one.
	pub after: Vec<String>,

	pub action: Action,

	/// Source config path (for debugging).
	pub source: Option<PathBuf>,
}

impl RewriteRule {
	pub fn new(name: impl Into<String>, action: Action) -> Self {
		RewriteRule {
			name: name.into(),
			description: None,
			after: Vec::new(),
			action,
			source: None,
		}
	}

	/// Declare that this rule runs after `rule`.
	pub fn after(mut self, rule: impl Into<String>) -> Self {
		self.after.push(rule.into());
		self
	}

	/// Compile a rule from a RuleWithSource. Expects a validated rule.
	pub fn from_rule_with_source(rws: &RuleWithSource) -> Result<Self> {
		let rule = &rws.rule;
		let action = compile_action(rule)?;
		Ok(RewriteRule {
			name: rule.name.clone(),
			description: rule.description.clone(),
			after: rule.after.clone(),
			action,
			source: Some(rws.source.clone()),
		})
	}
}

fn required<'a, T>(rule: &Rule, field: &'static str, value: &'a Option<T>) -> Result<&'a T> {
	value.as_ref().ok_or_else(|| WeaveError::MissingField {
		rule: rule.name.clone(),
		kind: rule.kind.as_str(),
		field,
	})
}

fn compile_action(rule: &Rule) -> Result<Action> {
	let action = match rule.kind {
		RuleKind::Inject => {
			let injection = Injection::new(
				required(rule, "signature", &rule.signature)?,
				required(rule, "anchor", &rule.anchor)?,
				required(rule, "body", &rule.body)?,
			)?;
			injection.validate(&rule.name)?;
			Action::Inject(injection)
		}
		RuleKind::InsertArg => Action::InsertArg(InsertArg {
			callee: Snippet::parse(required(rule, "callee", &rule.callee)?)?,
			leading: rule
				.leading
				.iter()
				.flatten()
				.map(|arg| Snippet::parse(arg))
				.collect::<Result<_>>()?,
			arg: Snippet::parse(required(rule, "arg", &rule.arg)?)?,
		}),
		RuleKind::ReplaceArg => Action::ReplaceArg(ReplaceArg {
			callee: Snippet::parse(required(rule, "callee", &rule.callee)?)?,
			index: *required(rule, "index", &rule.index)?,
			from: rule.from.as_deref().map(Snippet::parse).transpose()?,
			to: Snippet::parse(required(rule, "to", &rule.to)?)?,
		}),
		RuleKind::Rewrite => {
			let substitution = match &rule.substitution {
				Some(sed) => Substitution::parse(sed)?,
				None => Substitution::new(
					required(rule, "pattern", &rule.pattern)?,
					required(rule, "replacement", &rule.replacement)?,
					rule.global.unwrap_or(false),
				)?,
			};
			substitution.validate(&rule.name)?;
			Action::Rewrite(substitution)
		}
	};
	Ok(action)
}

/// Ordered rule set with declared dependencies.
///
/// Rules keep their declaration order except where a rule is declared to run
/// after one listed later; then it moves just past its dependencies.
#[derive(Debug, Default)]
pub struct Registry {
	rules: Vec<RewriteRule>,
	order: Vec<usize>,
}

impl Registry {
	pub fn new(rules: Vec<RewriteRule>) -> Result<Self> {
		let mut names = HashSet::new();
		for rule in &rules {
			if !names.insert(rule.name.as_str()) {
				return Err(WeaveError::DuplicateRule {
					name: rule.name.clone(),
				});
			}
		}
		for rule in &rules {
			if let Some(dependency) = rule.after.iter().find(|d| !names.contains(d.as_str())) {
				return Err(WeaveError::UnknownDependency {
					rule: rule.name.clone(),
					dependency: dependency.clone(),
				});
			}
		}

		let order = resolve_order(&rules)?;
		Ok(Registry { rules, order })
	}

	/// Rules in execution order.
	pub fn iter(&self) -> impl Iterator<Item = &RewriteRule> {
		self.order.iter().map(|&i| &self.rules[i])
	}

	/// Rules in declaration order.
	pub fn declared(&self) -> &[RewriteRule] {
		&self.rules
	}

	pub fn get(&self, name: &str) -> Option<&RewriteRule> {
		self.rules.iter().find(|rule| rule.name == name)
	}

	pub fn dependencies_of(&self, name: &str) -> Option<&[String]> {
		self.get(name).map(|rule| rule.after.as_slice())
	}

	pub fn len(&self) -> usize {
		self.rules.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rules.is_empty()
	}
}

/// Stable topological order: repeatedly take the earliest declared rule
/// whose dependencies have all been placed.
fn resolve_order(rules: &[RewriteRule]) -> Result<Vec<usize>> {
	let mut placed = vec![false; rules.len()];
	let mut order = Vec::with_capacity(rules.len());

	while order.len() < rules.len() {
		let next = (0..rules.len()).find(|&i| {
			!placed[i]
				&& rules[i].after.iter().all(|dep| {
					rules
						.iter()
						.position(|r| &r.name == dep)
						.is_some_and(|j| placed[j])
				})
		});

		match next {
			Some(i) => {
				placed[i] = true;
				order.push(i);
			}
			None => {
				return Err(WeaveError::DependencyCycle {
					rules: (0..rules.len())
						.filter(|&i| !placed[i])
						.map(|i| rules[i].name.clone())
						.collect(),
				});
			}
		}
	}

	Ok(order)
}

/// Compile all rules in a merged config.
pub fn compile_rules(config: &MergedConfig) -> Result<Registry> {
	let rules = config
		.rules
		.iter()
		.map(RewriteRule::from_rule_with_source)
		.collect::<Result<Vec<_>>>()?;
	Registry::new(rules)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn rewrite(name: &str) -> RewriteRule {
		RewriteRule::new(
			name,
			Action::Rewrite(Substitution::new("a", "b", false).unwrap()),
		)
	}

	fn names(registry: &Registry) -> Vec<&str> {
		registry.iter().map(|r| r.name.as_str()).collect()
	}

	fn make_rule_with_source(rule: Rule) -> RuleWithSource {
		RuleWithSource {
			rule,
			source: PathBuf::from("test.toml"),
		}
	}

	#[test]
	fn test_declaration_order_is_kept() {
		let registry = Registry::new(vec![rewrite("one"), rewrite("two"), rewrite("three")]).unwrap();
		assert_eq!(names(&registry), vec!["one", "two", "three"]);
	}

	#[test]
	fn test_dependency_moves_rule_later() {
		let registry = Registry::new(vec![
			rewrite("calls").after("inject"),
			rewrite("other"),
			rewrite("inject"),
		])
		.unwrap();
		assert_eq!(names(&registry), vec!["other", "inject", "calls"]);
		assert_eq!(registry.declared()[0].name, "calls");
		assert_eq!(
			registry.dependencies_of("calls"),
			Some(&["inject".to_string()][..])
		);
	}

	#[test]
	fn test_duplicate_names_rejected() {
		let err = Registry::new(vec![rewrite("x"), rewrite("x")]).unwrap_err();
		assert!(matches!(err, WeaveError::DuplicateRule { name } if name == "x"));
	}

	#[test]
	fn test_unknown_dependency_rejected() {
		let err = Registry::new(vec![rewrite("x").after("missing")]).unwrap_err();
		match err {
			WeaveError::UnknownDependency { rule, dependency } => {
				assert_eq!(rule, "x");
				assert_eq!(dependency, "missing");
			}
			other => panic!("Expected UnknownDependency, got {other:?}"),
		}
	}

	#[test]
	fn test_cycle_rejected() {
		let err = Registry::new(vec![
			rewrite("free"),
			rewrite("a").after("b"),
			rewrite("b").after("a"),
		])
		.unwrap_err();
		match err {
			WeaveError::DependencyCycle { rules } => assert_eq!(rules, vec!["a", "b"]),
			other => panic!("Expected DependencyCycle, got {other:?}"),
		}
	}

	#[test]
	fn test_compile_inject_rule() {
		let rws = make_rule_with_source(Rule {
			name: "SendImage".to_string(),
			kind: RuleKind::Inject,
			signature: Some("func SendImage(r ${kind}Request) {".to_string()),
			anchor: Some("validate(".to_string()),
			body: Some(vec!["log(\"${kind}\")".to_string()]),
			..Default::default()
		});
		let rule = RewriteRule::from_rule_with_source(&rws).unwrap();
		assert!(!rule.action.is_global());
		assert_eq!(rule.action.kind(), RuleKind::Inject);
		assert_eq!(rule.source, Some(PathBuf::from("test.toml")));
	}

	#[test]
	fn test_compile_inject_rule_with_unknown_slot() {
		let rws = make_rule_with_source(Rule {
			name: "bad".to_string(),
			kind: RuleKind::Inject,
			signature: Some("func F() {".to_string()),
			anchor: Some("validate(".to_string()),
			body: Some(vec!["log(${missing})".to_string()]),
			..Default::default()
		});
		assert!(matches!(
			RewriteRule::from_rule_with_source(&rws),
			Err(WeaveError::UnknownSlot { .. })
		));
	}

	#[test]
	fn test_compile_inject_rule_without_statements() {
		for body in [vec![], vec![String::new(), "\t".to_string()]] {
			let rws = make_rule_with_source(Rule {
				name: "blank".to_string(),
				kind: RuleKind::Inject,
				signature: Some("func F() {".to_string()),
				anchor: Some("validate(".to_string()),
				body: Some(body),
				..Default::default()
			});
			assert!(matches!(
				RewriteRule::from_rule_with_source(&rws),
				Err(WeaveError::InvalidTemplate { .. })
			));
		}
	}

	#[test]
	fn test_compile_call_site_rules_are_global() {
		let insert = make_rule_with_source(Rule {
			name: "upload".to_string(),
			kind: RuleKind::InsertArg,
			callee: Some("service.uploadMedia".to_string()),
			leading: Some(vec!["ctx".to_string()]),
			arg: Some("client".to_string()),
			..Default::default()
		});
		let replace = make_rule_with_source(Rule {
			name: "jid".to_string(),
			kind: RuleKind::ReplaceArg,
			callee: Some("utils.ValidateJidWithLogin".to_string()),
			index: Some(0),
			to: Some("client".to_string()),
			..Default::default()
		});
		for rws in [insert, replace] {
			assert!(RewriteRule::from_rule_with_source(&rws).unwrap().action.is_global());
		}
	}

	#[test]
	fn test_compile_rewrite_rule_checks_idempotence() {
		let rws = make_rule_with_source(Rule {
			name: "grow".to_string(),
			kind: RuleKind::Rewrite,
			pattern: Some("f(${x:text})".to_string()),
			replacement: Some("f(g(${x}))".to_string()),
			..Default::default()
		});
		let err = RewriteRule::from_rule_with_source(&rws).unwrap_err();
		assert!(matches!(err, WeaveError::NonIdempotentRule { .. }));
	}
}
