use crate::error::{Result, WeaveError};
use crate::rules::edit::{Application, Edit};
use crate::rules::lexer::tokenize;
use crate::rules::matcher::{Captures, Matcher};
use crate::rules::template::{Element, Replacement, Template};

/// A template rewrite: every match of `pattern` (or only the first, unless
/// `global`) is replaced by `replacement` rendered with the match's captures.
#[derive(Debug, Clone)]
pub struct Substitution {
	/// The template to match.
	pub pattern: Template,

	/// The replacement text, with `${name}` references to captured slots.
	pub replacement: Replacement,

	/// Whether to replace all occurrences (global flag).
	pub global: bool,

	/// The replacement read back as a template, to spot already-rewritten text.
	shape: Option<Template>,
}

impl Substitution {
	pub fn new(pattern: &str, replacement: &str, global: bool) -> Result<Self> {
		let pattern = Template::parse(pattern)?;
		let replacement = Replacement::parse(replacement)?;
		let shape = replacement.to_template(&pattern).ok();
		Ok(Substitution {
			pattern,
			replacement,
			global,
			shape,
		})
	}

	/// Parse a substitution in sed-like format: "s/pattern/replacement/" or
	/// "s/pattern/replacement/g". Any delimiter may follow the `s`, which
	/// helps since code is full of slashes: "s|a.B()|c|g".
	pub fn parse(input: &str) -> Result<Self> {
		let invalid = |reason: &str| WeaveError::InvalidTemplate {
			template: input.to_string(),
			reason: reason.to_string(),
		};

		let mut chars = input.chars();
		if chars.next() != Some('s') {
			return Err(invalid("substitution must start with 's'"));
		}
		let Some(delimiter) = chars.next() else {
			return Err(invalid("substitution too short"));
		};

		let parts = split_by_delimiter(chars.as_str(), delimiter);
		if parts.len() < 2 {
			return Err(invalid("substitution must have pattern and replacement"));
		}

		let flags = parts.get(2).map(String::as_str).unwrap_or("");
		if let Some(flag) = flags.chars().find(|c| *c != 'g') {
			return Err(invalid(&format!("unknown flag '{flag}'")));
		}

		Substitution::new(&parts[0], &parts[1], flags.contains('g'))
	}

	/// Check that the replacement only references captured slots and that
	/// rewritten text would not match the pattern again.
	///
	/// The replacement is rendered on its own here, so a rewrite that only
	/// re-matches together with its surroundings (`x.Foo` to `Foo` inside
	/// `x.x.Foo`) passes. `apply` counts those sites in `rematched`.
	pub fn validate(&self, rule: &str) -> Result<()> {
		self.replacement
			.check_references(rule, &self.pattern.slot_names())?;

		let sample = self.replacement.render(&sample_captures(&self.pattern));
		let tokens = tokenize(&sample);
		if Matcher::new(&sample, &tokens)
			.find_first(&self.pattern)
			.is_some()
		{
			return Err(WeaveError::NonIdempotentRule {
				rule: rule.to_string(),
			});
		}
		Ok(())
	}

	/// Compute the edits for `src`.
	pub fn apply(&self, src: &str) -> Application {
		let tokens = tokenize(src);
		let matcher = Matcher::new(src, &tokens);

		let matches = if self.global {
			matcher.find_all(&self.pattern)
		} else {
			matcher.find_first(&self.pattern).into_iter().collect()
		};

		let mut application = Application {
			edits: matches
				.iter()
				.map(|m| Edit::replace(m.start..m.end, self.replacement.render(&m.captures)))
				.collect(),
			already_rewritten: self
				.shape
				.as_ref()
				.map(|shape| {
					// Text the pattern still matches is not rewritten yet.
					matcher
						.find_all(shape)
						.iter()
						.filter(|s| !matches.iter().any(|m| s.start < m.end && m.start < s.end))
						.count()
				})
				.unwrap_or(0),
			rematched: 0,
		};
		application.rematched = self.rematched(&application, src);
		application
	}

	/// Rewritten spans that the pattern matches again in the spliced text.
	fn rematched(&self, application: &Application, src: &str) -> usize {
		let spliced = application.splice_tracked(src);
		if spliced.spans.is_empty() {
			return 0;
		}
		let tokens = tokenize(&spliced.text);
		let matches = Matcher::new(&spliced.text, &tokens).find_all(&self.pattern);
		spliced
			.spans
			.iter()
			.filter(|span| {
				matches
					.iter()
					.any(|m| m.start < span.end && span.start < m.end)
			})
			.count()
	}
}

/// Plausible stand-in values for each slot of `pattern`.
fn sample_captures(pattern: &Template) -> Captures {
	pattern
		.elements()
		.iter()
		.filter_map(|element| match element {
			Element::Ident { name, .. } | Element::Text { name } => {
				Some((name.clone(), format!("sample_{name}")))
			}
			Element::Exact { name, tokens } => Some((name.clone(), tokens.join(" "))),
			Element::Literal(_) | Element::LineBreak => None,
		})
		.collect()
}

/// Split a string by a delimiter, respecting backslash escapes.
fn split_by_delimiter(input: &str, delimiter: char) -> Vec<String> {
	let mut parts = Vec::new();
	let mut current = String::new();
	let mut chars = input.chars().peekable();
	let mut escape_next = false;

	while let Some(c) = chars.next() {
		if escape_next {
			current.push(c);
			escape_next = false;
		} else if c == '\\' {
			// Only an escaped delimiter loses its backslash
			if chars.peek() == Some(&delimiter) {
				escape_next = true;
			} else {
				current.push(c);
			}
		} else if c == delimiter {
			parts.push(current);
			current = String::new();
		} else {
			current.push(c);
		}
	}

	// Add the last part
	parts.push(current);

	parts
}
