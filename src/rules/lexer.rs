use std::ops::Range;

/// Kind of a lexical token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
	Ident,
	Number,
	Str,
	Punct,
}

/// A token and the byte span it covers in the text it was lexed from.
///
/// Whitespace and comments are trivia and never become tokens, so two texts
/// that differ only in spacing lex to the same token sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
	pub kind: TokenKind,
	pub span: Range<usize>,
}

impl Token {
	/// The text of this token within `src`.
	pub fn text<'s>(&self, src: &'s str) -> &'s str {
		&src[self.span.clone()]
	}

	pub fn is_open(&self, src: &str) -> bool {
		self.kind == TokenKind::Punct && matches!(self.text(src), "(" | "[" | "{")
	}

	pub fn is_close(&self, src: &str) -> bool {
		self.kind == TokenKind::Punct && matches!(self.text(src), ")" | "]" | "}")
	}
}

const THREE_CHAR_PUNCT: &[&str] = &["...", "<<=", ">>=", "&^="];

const TWO_CHAR_PUNCT: &[&str] = &[
	":=", "==", "!=", "<=", ">=", "&&", "||", "<-", "->", "=>", "::", "++", "--", "+=", "-=",
	"*=", "/=", "%=", "&=", "|=", "^=", "<<", ">>", "&^",
];

/// Split `src` into tokens.
pub fn tokenize(src: &str) -> Vec<Token> {
	let bytes = src.as_bytes();
	let mut tokens = Vec::new();
	let mut pos = 0;

	while pos < src.len() {
		let rest = &src[pos..];
		let Some(c) = rest.chars().next() else {
			break;
		};

		if c.is_whitespace() {
			pos += c.len_utf8();
			continue;
		}

		if rest.starts_with("//") {
			pos += rest.find('\n').unwrap_or(rest.len());
			continue;
		}

		if rest.starts_with("/*") {
			pos += rest[2..].find("*/").map(|i| i + 4).unwrap_or(rest.len());
			continue;
		}

		let start = pos;
		let kind = if c.is_alphabetic() || c == '_' {
			pos += scan_while(rest, |c| c.is_alphanumeric() || c == '_');
			TokenKind::Ident
		} else if c.is_ascii_digit() {
			pos += scan_while(rest, |c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
			TokenKind::Number
		} else if c == '"' || c == '\'' || c == '`' {
			pos += scan_string(rest, bytes[pos]);
			TokenKind::Str
		} else {
			let len = THREE_CHAR_PUNCT
				.iter()
				.chain(TWO_CHAR_PUNCT)
				.find(|op| rest.starts_with(**op))
				.map(|op| op.len())
				.unwrap_or(c.len_utf8());
			pos += len;
			TokenKind::Punct
		};

		tokens.push(Token {
			kind,
			span: start..pos,
		});
	}

	tokens
}

fn scan_while(s: &str, pred: impl Fn(char) -> bool) -> usize {
	s.char_indices()
		.find(|(_, c)| !pred(*c))
		.map(|(i, _)| i)
		.unwrap_or(s.len())
}

/// Length of the string literal at the start of `s`, quotes included.
/// Backquoted literals are raw and may span lines; the others stop at a
/// line break if left unterminated.
fn scan_string(s: &str, quote: u8) -> usize {
	let bytes = s.as_bytes();
	let mut i = 1;
	while i < bytes.len() {
		match bytes[i] {
			b'\\' if quote != b'`' => i += 2,
			b'\n' if quote != b'`' => return i,
			b if b == quote => return i + 1,
			_ => i += 1,
		}
	}
	bytes.len()
}

/// Whether two token slices spell the same text.
pub fn same_tokens(a_src: &str, a: &[Token], b_src: &str, b: &[Token]) -> bool {
	a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.text(a_src) == y.text(b_src))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn texts(src: &str) -> Vec<&str> {
		tokenize(src).iter().map(|t| t.text(src)).collect()
	}

	#[test]
	fn test_tokenize_signature() {
		assert_eq!(
			texts("func (s S) Send(ctx context.Context) {"),
			vec![
				"func", "(", "s", "S", ")", "Send", "(", "ctx", "context", ".", "Context", ")",
				"{"
			]
		);
	}

	#[test]
	fn test_whitespace_and_comments_are_trivia() {
		assert_eq!(texts("a  /* x */ b // tail\n c"), vec!["a", "b", "c"]);
		assert_eq!(texts("f(a,b)"), texts("f( a , b )"));
	}

	#[test]
	fn test_multi_char_operators() {
		assert_eq!(
			texts("x, err := y != nil"),
			vec!["x", ",", "err", ":=", "y", "!=", "nil"]
		);
		assert_eq!(texts("f(args...)"), vec!["f", "(", "args", "...", ")"]);
	}

	#[test]
	fn test_string_literals_are_single_tokens() {
		assert_eq!(
			texts(r#"fmt.Sprintf("a, (b\" c", `raw
text`)"#),
			vec![
				"fmt",
				".",
				"Sprintf",
				"(",
				r#""a, (b\" c""#,
				",",
				"`raw\ntext`",
				")"
			]
		);
	}

	#[test]
	fn test_spans_point_into_source() {
		let src = "\tclient, err";
		let tokens = tokenize(src);
		assert_eq!(tokens[0].span, 1..7);
		assert_eq!(tokens[0].kind, TokenKind::Ident);
		assert_eq!(tokens[1].kind, TokenKind::Punct);
	}

	#[test]
	fn test_same_tokens_ignores_spacing() {
		let a = "whatsapp.GetClient()";
		let b = "whatsapp . GetClient( )";
		assert!(same_tokens(a, &tokenize(a), b, &tokenize(b)));
		assert!(!same_tokens(a, &tokenize(a), "client", &tokenize("client")));
	}
}
