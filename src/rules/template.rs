//! Match templates: literal tokens interleaved with named capture slots.
//!
//! Template syntax is plain source text with placeholders:
//!
//! - `${name}` or `${name:ident}` captures one identifier
//! - `${name:text}` captures balanced free text up to the next literal
//! - `${name:"literal"}` matches a fixed token sequence and captures it
//! - `$$` is a literal dollar sign
//!
//! An identifier slot written directly against identifier characters, as in
//! `domainSend.${kind}Request`, is glued to them: it matches a single
//! identifier token with that prefix and suffix and captures the middle.

use crate::error::{Result, WeaveError};
use crate::rules::lexer::{TokenKind, tokenize};
use crate::rules::matcher::Captures;
use std::collections::BTreeSet;

/// Type of a capture slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
	Ident,
	Text,
	Exact,
}

impl SlotKind {
	fn parse(kind: &str) -> Option<Self> {
		match kind {
			"" | "ident" => Some(SlotKind::Ident),
			"text" => Some(SlotKind::Text),
			_ => None,
		}
	}
}

/// One element of a compiled template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
	/// A token that must appear verbatim.
	Literal(String),

	/// One identifier token `prefix + captured + suffix`.
	Ident {
		name: String,
		prefix: String,
		suffix: String,
	},

	/// One or more bracket-balanced tokens, captured as the source slice.
	Text { name: String },

	/// A fixed token sequence, captured as the source slice.
	Exact { name: String, tokens: Vec<String> },

	/// Zero tokens; the gap before the next token must be a line break.
	/// Only produced when joining a signature with its anchor.
	LineBreak,
}

impl Element {
	pub fn slot_name(&self) -> Option<&str> {
		match self {
			Element::Ident { name, .. } | Element::Text { name } | Element::Exact { name, .. } => {
				Some(name.as_str())
			}
			Element::Literal(_) | Element::LineBreak => None,
		}
	}

	fn slot_kind(&self) -> Option<SlotKind> {
		match self {
			Element::Ident { .. } => Some(SlotKind::Ident),
			Element::Text { .. } => Some(SlotKind::Text),
			Element::Exact { .. } => Some(SlotKind::Exact),
			Element::Literal(_) | Element::LineBreak => None,
		}
	}
}

/// A piece of template source before tokenization.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
	Text(String),
	Slot {
		name: String,
		kind: SlotKind,
		literal: Option<String>,
	},
}

/// A compiled match template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
	source: String,
	elements: Vec<Element>,
}

impl Template {
	/// Compile a template string.
	pub fn parse(template: &str) -> Result<Self> {
		let invalid = |reason: &str| WeaveError::InvalidTemplate {
			template: template.to_string(),
			reason: reason.to_string(),
		};

		let mut elements: Vec<Element> = Vec::new();
		// The last element is an identifier slot that may still take a suffix.
		let mut open_ident = false;
		// The last literal token is an identifier touching the next piece.
		let mut glue_prefix = false;

		for piece in split_pieces(template).map_err(|reason| invalid(&reason))? {
			match piece {
				Piece::Text(text) => {
					let tokens = tokenize(&text);
					let mut tokens = tokens.iter().peekable();

					if open_ident
						&& let Some(first) = tokens.peek()
						&& first.kind == TokenKind::Ident
						&& first.span.start == 0
						&& let Some(Element::Ident { suffix, .. }) = elements.last_mut()
					{
						*suffix = first.text(&text).to_string();
						tokens.next();
					}

					glue_prefix = false;
					for token in tokens {
						elements.push(Element::Literal(token.text(&text).to_string()));
						glue_prefix = token.kind == TokenKind::Ident && token.span.end == text.len();
					}
					open_ident = false;
				}
				Piece::Slot {
					name,
					kind: SlotKind::Exact,
					literal,
				} => {
					let literal = literal.unwrap_or_default();
					let tokens: Vec<String> = tokenize(&literal)
						.iter()
						.map(|t| t.text(&literal).to_string())
						.collect();
					if tokens.is_empty() {
						return Err(invalid(&format!("exact slot `{name}` is empty")));
					}
					elements.push(Element::Exact { name, tokens });
					open_ident = false;
					glue_prefix = false;
				}
				Piece::Slot { name, kind, .. } => {
					if matches!(
						elements.last(),
						Some(Element::Ident { .. } | Element::Text { .. })
					) {
						return Err(invalid(&format!("slot `{name}` directly follows another slot")));
					}
					if kind == SlotKind::Ident {
						let prefix = match (glue_prefix, elements.last()) {
							(true, Some(Element::Literal(text))) => {
								let text = text.clone();
								elements.pop();
								text
							}
							_ => String::new(),
						};
						elements.push(Element::Ident {
							name,
							prefix,
							suffix: String::new(),
						});
						open_ident = true;
					} else {
						elements.push(Element::Text { name });
						open_ident = false;
					}
					glue_prefix = false;
				}
			}
		}

		match elements.first() {
			None => return Err(invalid("template is empty")),
			Some(Element::Text { name }) => {
				return Err(invalid(&format!("template cannot start with text slot `{name}`")));
			}
			_ => {}
		}

		// Every slot name must keep one kind so repeated captures compare like for like.
		let mut kinds = std::collections::BTreeMap::new();
		for element in &elements {
			if let (Some(name), Some(kind)) = (element.slot_name(), element.slot_kind())
				&& *kinds.entry(name.to_string()).or_insert(kind) != kind
			{
				return Err(invalid(&format!("slot `{name}` is used with different kinds")));
			}
		}

		Ok(Template {
			source: template.to_string(),
			elements,
		})
	}

	/// Join a signature and the anchor statement that must start the next line.
	pub fn anchored(signature: &Template, anchor: &Template) -> Template {
		let mut elements = signature.elements.clone();
		elements.push(Element::LineBreak);
		elements.extend(anchor.elements.iter().cloned());
		Template {
			source: format!("{}\n{}", signature.source, anchor.source),
			elements,
		}
	}

	pub fn as_str(&self) -> &str {
		&self.source
	}

	pub fn elements(&self) -> &[Element] {
		&self.elements
	}

	/// Names of every capture slot in this template.
	pub fn slot_names(&self) -> BTreeSet<&str> {
		self.elements.iter().filter_map(Element::slot_name).collect()
	}

	pub fn slot_kind(&self, name: &str) -> Option<SlotKind> {
		self.elements
			.iter()
			.find(|e| e.slot_name() == Some(name))
			.and_then(Element::slot_kind)
	}
}

/// Text with `${name}` references to captured slots, rendered verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
	source: String,
	pieces: Vec<Piece>,
}

impl Replacement {
	pub fn parse(replacement: &str) -> Result<Self> {
		let invalid = |reason: String| WeaveError::InvalidTemplate {
			template: replacement.to_string(),
			reason,
		};
		let pieces = split_pieces(replacement).map_err(invalid)?;
		if let Some(Piece::Slot { name, .. }) = pieces
			.iter()
			.find(|p| matches!(p, Piece::Slot { kind, .. } if *kind != SlotKind::Ident))
		{
			return Err(invalid(format!(
				"reference `{name}` cannot declare a slot kind"
			)));
		}
		Ok(Replacement {
			source: replacement.to_string(),
			pieces,
		})
	}

	pub fn as_str(&self) -> &str {
		&self.source
	}

	/// Names of every slot referenced.
	pub fn references(&self) -> impl Iterator<Item = &str> {
		self.pieces.iter().filter_map(|p| match p {
			Piece::Slot { name, .. } => Some(name.as_str()),
			Piece::Text(_) => None,
		})
	}

	/// Fail with the first reference not in `slots`.
	pub fn check_references(&self, rule: &str, slots: &BTreeSet<&str>) -> Result<()> {
		match self.references().find(|name| !slots.contains(name)) {
			Some(slot) => Err(WeaveError::UnknownSlot {
				rule: rule.to_string(),
				slot: slot.to_string(),
			}),
			None => Ok(()),
		}
	}

	pub fn render(&self, captures: &Captures) -> String {
		let mut out = String::new();
		for piece in &self.pieces {
			match piece {
				Piece::Text(text) => out.push_str(text),
				Piece::Slot { name, .. } => {
					out.push_str(captures.get(name).map(String::as_str).unwrap_or_default())
				}
			}
		}
		out
	}

	/// Re-read this replacement as a template, giving each reference the
	/// slot kind it has in `pattern`. Used to find text that already has the
	/// rewritten shape.
	pub fn to_template(&self, pattern: &Template) -> Result<Template> {
		let mut source = String::new();
		for piece in &self.pieces {
			match piece {
				Piece::Text(text) => source.push_str(&text.replace('$', "$$")),
				Piece::Slot { name, .. } => match pattern.slot_kind(name) {
					Some(SlotKind::Ident) | None => source.push_str(&format!("${{{name}}}")),
					Some(SlotKind::Text | SlotKind::Exact) => {
						source.push_str(&format!("${{{name}:text}}"))
					}
				},
			}
		}
		Template::parse(&source)
	}
}

/// Split template source into literal text and slot pieces.
fn split_pieces(input: &str) -> std::result::Result<Vec<Piece>, String> {
	let mut pieces = Vec::new();
	let mut current = String::new();
	let mut chars = input.chars().peekable();

	while let Some(c) = chars.next() {
		if c != '$' {
			current.push(c);
			continue;
		}

		match chars.peek() {
			Some('$') => {
				chars.next();
				current.push('$');
			}
			Some('{') => {
				chars.next();
				if !current.is_empty() {
					pieces.push(Piece::Text(std::mem::take(&mut current)));
				}
				pieces.push(parse_slot(&mut chars)?);
			}
			_ => current.push('$'),
		}
	}

	if !current.is_empty() {
		pieces.push(Piece::Text(current));
	}

	Ok(pieces)
}

/// Parse the inside of `${...}`, consuming the closing brace.
fn parse_slot(
	chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
) -> std::result::Result<Piece, String> {
	let mut name = String::new();
	while let Some(&c) = chars.peek() {
		if c.is_alphanumeric() || c == '_' {
			name.push(c);
			chars.next();
		} else {
			break;
		}
	}
	if name.is_empty() {
		return Err("slot without a name".to_string());
	}

	match chars.next() {
		Some('}') => Ok(Piece::Slot {
			name,
			kind: SlotKind::Ident,
			literal: None,
		}),
		Some(':') if chars.peek() == Some(&'"') => {
			chars.next();
			let mut literal = String::new();
			loop {
				match chars.next() {
					Some('\\') => match chars.next() {
						Some(c) => literal.push(c),
						None => return Err(format!("unterminated literal in slot `{name}`")),
					},
					Some('"') => break,
					Some(c) => literal.push(c),
					None => return Err(format!("unterminated literal in slot `{name}`")),
				}
			}
			if chars.next() != Some('}') {
				return Err(format!("expected `}}` after literal in slot `{name}`"));
			}
			Ok(Piece::Slot {
				name,
				kind: SlotKind::Exact,
				literal: Some(literal),
			})
		}
		Some(':') => {
			let mut kind = String::new();
			loop {
				match chars.next() {
					Some('}') => break,
					Some(c) => kind.push(c),
					None => return Err(format!("unterminated slot `{name}`")),
				}
			}
			let kind = SlotKind::parse(kind.trim())
				.ok_or_else(|| format!("unknown kind `{}` for slot `{name}`", kind.trim()))?;
			Ok(Piece::Slot {
				name,
				kind,
				literal: None,
			})
		}
		_ => Err(format!("unterminated slot `{name}`")),
	}
}
