//! Call-site rules: find calls by callee path and leading arguments, then
//! insert or substitute one argument. These rules are global; every
//! qualifying call in the buffer is rewritten in one pass.

use crate::error::{Result, WeaveError};
use crate::rules::edit::{Application, Edit};
use crate::rules::lexer::{Token, TokenKind, same_tokens, tokenize};
use std::ops::Range;

/// A source fragment kept with its tokens for token-wise comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
	text: String,
	tokens: Vec<Token>,
}

impl Snippet {
	pub fn parse(text: &str) -> Result<Self> {
		let text = text.trim().to_string();
		let tokens = tokenize(&text);
		if tokens.is_empty() {
			return Err(WeaveError::InvalidTemplate {
				template: text,
				reason: "expected code, found nothing".to_string(),
			});
		}
		Ok(Snippet { text, tokens })
	}

	pub fn as_str(&self) -> &str {
		&self.text
	}

	fn matches(&self, src: &str, tokens: &[Token]) -> bool {
		same_tokens(&self.text, &self.tokens, src, tokens)
	}
}

/// A parsed call expression `callee(arg, ...)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
	/// Token range of each argument, in order.
	pub args: Vec<Range<usize>>,

	/// Token index of the opening parenthesis.
	pub open: usize,

	/// Token index of the closing parenthesis.
	pub close: usize,
}

/// Find every call of `callee` in the buffer.
///
/// `callee` must be a dotted path; calls reached through a longer path
/// (`x.callee(...)`) and function declarations named `callee` are ignored.
/// Calls whose parentheses do not balance are skipped.
pub fn find_calls(src: &str, tokens: &[Token], callee: &Snippet) -> Vec<CallSite> {
	let width = callee.tokens.len();
	let mut calls = Vec::new();

	for start in 0..tokens.len().saturating_sub(width) {
		let open = start + width;
		if !callee.matches(src, &tokens[start..open])
			|| tokens[open].text(src) != "("
			|| is_qualified_or_declared(src, tokens, start)
		{
			continue;
		}
		if let Some(call) = parse_arguments(src, tokens, open) {
			calls.push(call);
		}
	}

	calls
}

fn is_qualified_or_declared(src: &str, tokens: &[Token], start: usize) -> bool {
	let Some(prev) = start.checked_sub(1).map(|i| &tokens[i]) else {
		return false;
	};
	match prev.text(src) {
		"." | "func" => true,
		")" => is_method_receiver(src, tokens, start - 1, start),
		_ => false,
	}
}

/// Whether the group closed at `close` is the receiver of a method
/// declaration `func (recv T) name(`: it shares a line with the name, and
/// its `func` starts a line or follows a closed block, unlike the function
/// type in `var cb func()`.
fn is_method_receiver(src: &str, tokens: &[Token], close: usize, name: usize) -> bool {
	if src[tokens[close].span.end..tokens[name].span.start].contains('\n') {
		return false;
	}
	let Some(func) = matching_open(src, tokens, close).and_then(|open| open.checked_sub(1)) else {
		return false;
	};
	if tokens[func].text(src) != "func" {
		return false;
	}
	match func.checked_sub(1).map(|i| &tokens[i]) {
		None => true,
		Some(before) => {
			matches!(before.text(src), "}" | ")" | ";")
				|| src[before.span.end..tokens[func].span.start].contains('\n')
		}
	}
}

/// Index of the bracket opening the group closed at `close`.
fn matching_open(src: &str, tokens: &[Token], close: usize) -> Option<usize> {
	let mut depth = 0usize;
	for i in (0..=close).rev() {
		if tokens[i].is_close(src) {
			depth += 1;
		} else if tokens[i].is_open(src) {
			depth -= 1;
			if depth == 0 {
				return Some(i);
			}
		}
	}
	None
}

fn parse_arguments(src: &str, tokens: &[Token], open: usize) -> Option<CallSite> {
	let mut args = Vec::new();
	let mut depth = 0usize;
	let mut arg_start = open + 1;

	for (i, token) in tokens.iter().enumerate().skip(open + 1) {
		if token.is_open(src) {
			depth += 1;
		} else if token.is_close(src) {
			if depth > 0 {
				depth -= 1;
				continue;
			}
			if token.text(src) != ")" {
				return None;
			}
			if i > arg_start {
				args.push(arg_start..i);
			}
			return Some(CallSite {
				args,
				open,
				close: i,
			});
		} else if depth == 0 && token.kind == TokenKind::Punct && token.text(src) == "," {
			if i == arg_start {
				return None;
			}
			args.push(arg_start..i);
			arg_start = i + 1;
		}
	}

	None
}

fn arg_span(tokens: &[Token], arg: &Range<usize>) -> Range<usize> {
	tokens[arg.start].span.start..tokens[arg.end - 1].span.end
}

/// Insert an argument after a fixed list of leading arguments:
/// `callee(ctx, x)` becomes `callee(ctx, client, x)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertArg {
	pub callee: Snippet,
	pub leading: Vec<Snippet>,
	pub arg: Snippet,
}

impl InsertArg {
	pub fn apply(&self, src: &str) -> Application {
		let tokens = tokenize(src);
		let position = self.leading.len();
		let mut application = Application::default();

		for call in find_calls(src, &tokens, &self.callee) {
			if call.args.len() < position
				|| !self
					.leading
					.iter()
					.zip(&call.args)
					.all(|(expected, arg)| expected.matches(src, &tokens[arg.clone()]))
			{
				continue;
			}

			let edit = match call.args.get(position) {
				Some(next) if self.arg.matches(src, &tokens[next.clone()]) => {
					application.already_rewritten += 1;
					continue;
				}
				Some(next) => {
					let at = tokens[next.start].span.start;
					Edit::insert(at, format!("{}, ", self.arg.as_str()))
				}
				None if position == 0 => {
					Edit::insert(tokens[call.close].span.start, self.arg.as_str().to_string())
				}
				None => {
					let at = arg_span(&tokens, &call.args[position - 1]).end;
					Edit::insert(at, format!(", {}", self.arg.as_str()))
				}
			};
			application.edits.push(edit);
		}

		application
	}
}

/// Replace the argument at `index`, optionally only where it currently
/// equals `from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceArg {
	pub callee: Snippet,
	pub index: usize,
	pub from: Option<Snippet>,
	pub to: Snippet,
}

impl ReplaceArg {
	pub fn apply(&self, src: &str) -> Application {
		let tokens = tokenize(src);
		let mut application = Application::default();

		for call in find_calls(src, &tokens, &self.callee) {
			let Some(arg) = call.args.get(self.index) else {
				continue;
			};
			let current = &tokens[arg.clone()];
			if self.to.matches(src, current) {
				application.already_rewritten += 1;
				continue;
			}
			if self.from.as_ref().is_some_and(|from| !from.matches(src, current)) {
				continue;
			}
			application
				.edits
				.push(Edit::replace(arg_span(&tokens, arg), self.to.as_str()));
		}

		application
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn snippet(s: &str) -> Snippet {
		Snippet::parse(s).unwrap()
	}

	fn insert(callee: &str, leading: &[&str], arg: &str) -> InsertArg {
		InsertArg {
			callee: snippet(callee),
			leading: leading.iter().map(|s| snippet(s)).collect(),
			arg: snippet(arg),
		}
	}

	#[test]
	fn test_find_calls_splits_arguments() {
		let src = "x := f(a, g(b, c), [d, e])";
		let tokens = tokenize(src);
		let calls = find_calls(src, &tokens, &snippet("f"));
		assert_eq!(calls.len(), 1);
		let args: Vec<_> = calls[0]
			.args
			.iter()
			.map(|a| &src[arg_span(&tokens, a)])
			.collect();
		assert_eq!(args, vec!["a", "g(b, c)", "[d, e]"]);
	}

	#[test]
	fn test_find_calls_skips_declarations_and_longer_paths() {
		let src = "func helper(a int) {}\nfunc (s S) helper(a int) {}\nobj.helper(a)\nhelper(a)";
		let tokens = tokenize(src);
		let calls = find_calls(src, &tokens, &snippet("helper"));
		assert_eq!(calls.len(), 1);
		assert_eq!(tokens[calls[0].open - 1].span.start, src.rfind("helper").unwrap());
	}

	#[test]
	fn test_call_after_function_type_is_found() {
		let rule = insert("helper", &["ctx"], "client");
		for src in [
			"var cb func()\nhelper(ctx, x)\n",
			"type Handler func(int)\nhelper(ctx, x)\n",
		] {
			let applied = rule.apply(src);
			assert_eq!(applied.edits.len(), 1, "call missed in {src:?}");
			assert!(applied.splice(src).contains("helper(ctx, client, x)"));
		}
	}

	#[test]
	fn test_method_declarations_are_skipped() {
		for src in [
			"package usecase\n\nfunc (s S) helper(ctx int) {}\n",
			"import (\n\t\"fmt\"\n) func (s S) helper(ctx int) {}\n",
		] {
			let tokens = tokenize(src);
			assert!(find_calls(src, &tokens, &snippet("helper")).is_empty(), "{src:?}");
		}
	}

	#[test]
	fn test_find_calls_skips_unbalanced() {
		let src = "f(a, (b]";
		let tokens = tokenize(src);
		assert!(find_calls(src, &tokens, &snippet("f")).is_empty());
	}

	#[test]
	fn test_insert_arg_every_call_site() {
		let src = "helper(fixedArg, one)\nhelper(fixedArg, two)\nhelper(fixedArg, three)\nhelper(other, four)\n";
		let applied = insert("helper", &["fixedArg"], "newArg").apply(src);
		assert_eq!(applied.edits.len(), 3);
		assert_eq!(
			applied.splice(src),
			"helper(fixedArg, newArg, one)\nhelper(fixedArg, newArg, two)\nhelper(fixedArg, newArg, three)\nhelper(other, four)\n"
		);
	}

	#[test]
	fn test_insert_arg_is_idempotent() {
		let rule = insert("service.uploadMedia", &["ctx"], "client");
		let src = "resp, err := service.uploadMedia(ctx, whatsmeow.MediaImage, data)";
		let once = rule.apply(src).splice(src);
		assert_eq!(
			once,
			"resp, err := service.uploadMedia(ctx, client, whatsmeow.MediaImage, data)"
		);

		let again = rule.apply(&once);
		assert!(again.edits.is_empty());
		assert_eq!(again.already_rewritten, 1);
	}

	#[test]
	fn test_insert_arg_at_end_of_argument_list() {
		let rule = insert("f", &["ctx"], "client");
		assert_eq!(rule.apply("f(ctx)").splice("f(ctx)"), "f(ctx, client)");

		let rule = insert("f", &[], "client");
		assert_eq!(rule.apply("f()").splice("f()"), "f(client)");
		assert_eq!(rule.apply("f(x)").splice("f(x)"), "f(client, x)");
	}

	#[test]
	fn test_insert_arg_nested_calls() {
		let rule = insert("wrap", &["ctx"], "client");
		let src = "wrap(ctx, wrap(ctx, x))";
		assert_eq!(
			rule.apply(src).splice(src),
			"wrap(ctx, client, wrap(ctx, client, x))"
		);
	}

	#[test]
	fn test_replace_arg() {
		let rule = ReplaceArg {
			callee: snippet("utils.ValidateJidWithLogin"),
			index: 0,
			from: Some(snippet("whatsapp.GetClient()")),
			to: snippet("client"),
		};
		let src = "a, err := utils.ValidateJidWithLogin(whatsapp.GetClient(), request.Phone)\n\
		           b, err := utils.ValidateJidWithLogin(other, request.Phone)\n";
		let applied = rule.apply(src);
		assert_eq!(applied.edits.len(), 1);
		let out = applied.splice(src);
		assert!(out.contains("utils.ValidateJidWithLogin(client, request.Phone)"));
		assert!(out.contains("utils.ValidateJidWithLogin(other, request.Phone)"));

		let again = rule.apply(&out);
		assert!(again.edits.is_empty());
		assert_eq!(again.already_rewritten, 1);
	}

	#[test]
	fn test_replace_arg_missing_index_is_skipped() {
		let rule = ReplaceArg {
			callee: snippet("f"),
			index: 2,
			from: None,
			to: snippet("z"),
		};
		assert!(rule.apply("f(a, b)").edits.is_empty());
	}

	#[test]
	fn test_empty_snippet_rejected() {
		assert!(Snippet::parse("  ").is_err());
	}
}
