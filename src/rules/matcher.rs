use crate::rules::lexer::{Token, TokenKind};
use crate::rules::template::{Element, Template};
use std::collections::BTreeMap;

/// Captured slot values, keyed by slot name.
pub type Captures = BTreeMap<String, String>;

/// A located occurrence of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
	/// Byte offset of the first matched token.
	pub start: usize,

	/// Byte offset just past the last matched token.
	pub end: usize,

	/// Slot values, each a verbatim slice of the source.
	pub captures: Captures,

	/// Leading whitespace of the line the match starts on.
	pub indent: String,

	/// Where the anchor statement starts, for anchored matches.
	pub anchor: Option<Anchor>,
}

/// The statement that immediately follows a matched signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
	/// Byte offset just past the signature.
	pub signature_end: usize,

	/// Byte offset of the anchor's first token.
	pub start: usize,

	/// Leading whitespace of the anchor's line.
	pub indent: String,
}

#[derive(Debug, Clone, Default)]
struct State {
	captures: Captures,
	line_break: Option<usize>,
}

impl State {
	fn bind(&self, name: &str, value: &str) -> Option<State> {
		match self.captures.get(name) {
			Some(existing) if existing != value => None,
			Some(_) => Some(self.clone()),
			None => {
				let mut next = self.clone();
				next.captures.insert(name.to_string(), value.to_string());
				Some(next)
			}
		}
	}
}

/// Structural matcher over one lexed buffer.
#[derive(Debug, Clone, Copy)]
pub struct Matcher<'a> {
	src: &'a str,
	tokens: &'a [Token],
}

impl<'a> Matcher<'a> {
	pub fn new(src: &'a str, tokens: &'a [Token]) -> Self {
		Matcher { src, tokens }
	}

	/// The first occurrence of `template`, scanning from the start.
	pub fn find_first(&self, template: &Template) -> Option<Match> {
		self.find_from(template, 0).map(|(m, _)| m)
	}

	/// Every non-overlapping occurrence of `template`, left to right.
	pub fn find_all(&self, template: &Template) -> Vec<Match> {
		let mut matches = Vec::new();
		let mut pos = 0;
		while let Some((m, next)) = self.find_from(template, pos) {
			matches.push(m);
			pos = next;
		}
		matches
	}

	/// The first occurrence of `signature` immediately followed, on a later
	/// line, by `anchor`. Candidates whose anchor does not follow are skipped.
	pub fn find_anchored(&self, signature: &Template, anchor: &Template) -> Option<Match> {
		self.find_first(&Template::anchored(signature, anchor))
	}

	fn find_from(&self, template: &Template, from: usize) -> Option<(Match, usize)> {
		(from..self.tokens.len()).find_map(|pos| {
			let (end, state) = self.match_elements(template.elements(), pos, &State::default())?;
			Some((self.build_match(pos, end, state), end))
		})
	}

	fn build_match(&self, first: usize, end: usize, state: State) -> Match {
		let start = self.tokens[first].span.start;
		let anchor = state.line_break.map(|at| {
			let anchor_start = self.tokens[at].span.start;
			Anchor {
				signature_end: self.tokens[at - 1].span.end,
				start: anchor_start,
				indent: line_indent(self.src, anchor_start).to_string(),
			}
		});
		Match {
			start,
			end: self.tokens[end - 1].span.end,
			captures: state.captures,
			indent: line_indent(self.src, start).to_string(),
			anchor,
		}
	}

	/// Source text covering tokens `from..to`.
	fn slice(&self, from: usize, to: usize) -> &'a str {
		&self.src[self.tokens[from].span.start..self.tokens[to - 1].span.end]
	}

	/// Match `elements` starting at token `pos`, returning the index just past
	/// the last consumed token.
	fn match_elements(
		&self,
		elements: &[Element],
		pos: usize,
		state: &State,
	) -> Option<(usize, State)> {
		let Some((first, rest)) = elements.split_first() else {
			return Some((pos, state.clone()));
		};

		match first {
			Element::Literal(text) => {
				let token = self.tokens.get(pos)?;
				if token.text(self.src) != text {
					return None;
				}
				self.match_elements(rest, pos + 1, state)
			}
			Element::Ident {
				name,
				prefix,
				suffix,
			} => {
				let token = self.tokens.get(pos)?;
				let text = token.text(self.src);
				if token.kind != TokenKind::Ident
					|| text.len() <= prefix.len() + suffix.len()
					|| !text.starts_with(prefix.as_str())
					|| !text.ends_with(suffix.as_str())
				{
					return None;
				}
				let middle = &text[prefix.len()..text.len() - suffix.len()];
				let state = state.bind(name, middle)?;
				self.match_elements(rest, pos + 1, &state)
			}
			Element::Exact { name, tokens } => {
				let end = pos + tokens.len();
				let window = self.tokens.get(pos..end)?;
				if !window
					.iter()
					.zip(tokens)
					.all(|(t, expected)| t.text(self.src) == expected)
				{
					return None;
				}
				let state = state.bind(name, self.slice(pos, end))?;
				self.match_elements(rest, end, &state)
			}
			Element::Text { name } => self.match_text(name, rest, pos, state),
			Element::LineBreak => {
				if pos == 0 || pos >= self.tokens.len() {
					return None;
				}
				let gap = &self.src[self.tokens[pos - 1].span.end..self.tokens[pos].span.start];
				if !gap.contains('\n') || !gap.chars().all(char::is_whitespace) {
					return None;
				}
				let mut state = state.clone();
				state.line_break = Some(pos);
				self.match_elements(rest, pos, &state)
			}
		}
	}

	/// Grow a text slot one token at a time, trying the rest of the template
	/// at every point where brackets are balanced.
	fn match_text(
		&self,
		name: &str,
		rest: &[Element],
		pos: usize,
		state: &State,
	) -> Option<(usize, State)> {
		let mut depth = 0usize;
		let mut end = pos;

		loop {
			if depth == 0 && end > pos && !rest.is_empty() {
				let found = state
					.bind(name, self.slice(pos, end))
					.and_then(|bound| self.match_elements(rest, end, &bound));
				if found.is_some() {
					return found;
				}
			}

			let Some(token) = self.tokens.get(end) else {
				// Ran off the end of the buffer.
				if rest.is_empty() && depth == 0 && end > pos {
					return state.bind(name, self.slice(pos, end)).map(|s| (end, s));
				}
				return None;
			};

			if token.is_close(self.src) {
				if depth == 0 {
					if rest.is_empty() && end > pos {
						return state.bind(name, self.slice(pos, end)).map(|s| (end, s));
					}
					return None;
				}
				depth -= 1;
			} else if token.is_open(self.src) {
				depth += 1;
			}
			end += 1;
		}
	}
}

/// Leading whitespace of the line containing byte offset `at`.
pub fn line_indent(src: &str, at: usize) -> &str {
	let line_start = src[..at].rfind('\n').map(|i| i + 1).unwrap_or(0);
	let line = &src[line_start..at];
	let width = line
		.char_indices()
		.find(|(_, c)| *c != ' ' && *c != '\t')
		.map(|(i, _)| i)
		.unwrap_or(line.len());
	&line[..width]
}
