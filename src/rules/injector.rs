use crate::error::{Result, WeaveError};
use crate::rules::edit::{Application, Edit};
use crate::rules::lexer::tokenize;
use crate::rules::matcher::{Match, Matcher};
use crate::rules::template::{Replacement, Template};
use std::collections::BTreeSet;

/// Inject `body` into the first function whose `signature` is directly
/// followed by `anchor`.
#[derive(Debug, Clone)]
pub struct Injection {
	pub signature: Template,
	pub anchor: Template,
	pub body: BodyTemplate,
}

impl Injection {
	pub fn new(signature: &str, anchor: &str, body: &[impl AsRef<str>]) -> Result<Self> {
		Ok(Injection {
			signature: Template::parse(signature)?,
			anchor: Template::parse(anchor)?,
			body: BodyTemplate::parse(body)?,
		})
	}

	/// Body lines may reference slots of the signature or the anchor.
	pub fn validate(&self, rule: &str) -> Result<()> {
		let mut slots = self.signature.slot_names();
		slots.extend(self.anchor.slot_names());
		self.body.check_references(rule, &slots)
	}

	/// At most one edit: the first anchored match, rewritten.
	pub fn apply(&self, src: &str) -> Application {
		let tokens = tokenize(src);
		let edits = Matcher::new(src, &tokens)
			.find_anchored(&self.signature, &self.anchor)
			.and_then(|m| inject(src, &m, &self.body).map(|text| Edit::replace(m.start..m.end, text)))
			.into_iter()
			.collect();
		Application {
			edits,
			..Default::default()
		}
	}
}

/// One synthesized line: nesting depth below the body indentation, and text.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BodyLine {
	depth: usize,
	text: Option<Replacement>,
}

/// Statements to inject at the top of a matched function body.
///
/// Each configured line's leading tabs give its depth relative to the body;
/// `"\treturn response, err"` sits one level inside the line above it. Blank
/// lines are emitted without indentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyTemplate {
	lines: Vec<BodyLine>,
}

impl BodyTemplate {
	pub fn parse<S: AsRef<str>>(source: &[S]) -> Result<Self> {
		let lines = source
			.iter()
			.map(|line| {
				let line = line.as_ref();
				let text = line.trim_start_matches('\t');
				let depth = line.len() - text.len();
				if text.trim().is_empty() {
					Ok(BodyLine {
						depth: 0,
						text: None,
					})
				} else {
					Ok(BodyLine {
						depth,
						text: Some(Replacement::parse(text)?),
					})
				}
			})
			.collect::<Result<Vec<_>>>()?;

		// Blank lines alone leave the anchor on the next line, so the rule
		// would match again on every run.
		if lines.iter().all(|line| line.text.is_none()) {
			return Err(WeaveError::InvalidTemplate {
				template: source
					.iter()
					.map(|line| line.as_ref())
					.collect::<Vec<&str>>()
					.join("\n"),
				reason: "body must contain at least one statement".to_string(),
			});
		}

		Ok(BodyTemplate { lines })
	}

	pub fn len(&self) -> usize {
		self.lines.len()
	}

	pub fn is_empty(&self) -> bool {
		self.lines.is_empty()
	}

	/// Fail if any line references a slot that is not captured.
	pub fn check_references(&self, rule: &str, slots: &BTreeSet<&str>) -> Result<()> {
		self.lines
			.iter()
			.filter_map(|line| line.text.as_ref())
			.try_for_each(|text| text.check_references(rule, slots))
	}
}

/// One level of indentation: what the body adds on top of the signature's
/// line. Falls back to a tab when neither is indented.
pub fn indent_unit<'a>(signature_indent: &str, body_indent: &'a str) -> &'a str {
	match body_indent.strip_prefix(signature_indent) {
		Some("") | None if body_indent.is_empty() => "\t",
		Some("") => body_indent,
		Some(unit) => unit,
		None => body_indent,
	}
}

/// Build the replacement for an anchored match: the signature, the
/// synthesized lines, then the original gap and anchor text unchanged.
///
/// Returns `None` for matches without an anchor.
pub fn inject(src: &str, m: &Match, body: &BodyTemplate) -> Option<String> {
	let anchor = m.anchor.as_ref()?;
	let unit = indent_unit(&m.indent, &anchor.indent);

	let mut out = String::with_capacity(m.end - m.start + body.len() * 48);
	out.push_str(&src[m.start..anchor.signature_end]);
	for line in &body.lines {
		out.push('\n');
		if let Some(text) = &line.text {
			out.push_str(&anchor.indent);
			for _ in 0..line.depth {
				out.push_str(unit);
			}
			out.push_str(&text.render(&m.captures));
		}
	}
	out.push_str(&src[anchor.signature_end..m.end]);
	Some(out)
}
