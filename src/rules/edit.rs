use std::ops::Range;

/// Replace one byte span of the buffer. Insertions have an empty span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
	pub span: Range<usize>,
	pub text: String,
}

impl Edit {
	pub fn insert(at: usize, text: impl Into<String>) -> Self {
		Edit {
			span: at..at,
			text: text.into(),
		}
	}

	pub fn replace(span: Range<usize>, text: impl Into<String>) -> Self {
		Edit {
			span,
			text: text.into(),
		}
	}

	/// Whether applying this edit to `src` would leave it unchanged.
	pub fn is_noop(&self, src: &str) -> bool {
		src.get(self.span.clone()) == Some(self.text.as_str())
	}
}

/// Result of applying one rule to a buffer, before anything is written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Application {
	/// Edits to make. Overlapping edits are resolved by `splice`.
	pub edits: Vec<Edit>,

	/// Sites that already have the rewritten shape.
	pub already_rewritten: usize,

	/// Rewritten sites that the rule's own pattern matches again once they
	/// sit in the surrounding text.
	pub rematched: usize,
}

/// Spliced text with the output ranges each applied edit produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spliced {
	pub text: String,
	pub spans: Vec<Range<usize>>,
}

impl Spliced {
	/// Number of edits that changed the text.
	pub fn applied(&self) -> usize {
		self.spans.len()
	}
}

impl Application {
	/// Apply the edits to `src`. Edits are taken in span order; one that
	/// overlaps an earlier edit is dropped, and one that would not change the
	/// text is not counted. Text outside the edited spans is copied unchanged.
	pub fn splice_tracked(&self, src: &str) -> Spliced {
		let mut edits: Vec<&Edit> = self.edits.iter().collect();
		edits.sort_by_key(|e| (e.span.start, e.span.end));

		let mut text = String::with_capacity(src.len() + edits.iter().map(|e| e.text.len()).sum::<usize>());
		let mut spans = Vec::new();
		let mut cursor = 0;
		for edit in edits {
			if edit.span.start < cursor {
				continue;
			}
			text.push_str(&src[cursor..edit.span.start]);
			let start = text.len();
			text.push_str(&edit.text);
			if !edit.is_noop(src) {
				spans.push(start..text.len());
			}
			cursor = edit.span.end;
		}
		text.push_str(&src[cursor..]);
		Spliced { text, spans }
	}

	pub fn splice(&self, src: &str) -> String {
		self.splice_tracked(src).text
	}

	/// Splice into `buffer` in place, returning the number of edits that
	/// changed it.
	pub fn apply_to(&self, buffer: &mut String) -> usize {
		let spliced = self.splice_tracked(buffer);
		let applied = spliced.applied();
		if applied > 0 {
			*buffer = spliced.text;
		}
		applied
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn application(edits: Vec<Edit>) -> Application {
		Application {
			edits,
			..Default::default()
		}
	}

	#[test]
	fn test_splice_in_any_order() {
		let application = application(vec![Edit::replace(6..11, "there"), Edit::insert(0, ">> ")]);
		assert_eq!(application.splice("hello world"), ">> hello there");
	}

	#[test]
	fn test_splice_drops_overlapping_edit() {
		let application = application(vec![Edit::replace(0..5, "HELLO"), Edit::replace(2..4, "xx")]);
		let spliced = application.splice_tracked("hello world");
		assert_eq!(spliced.text, "HELLO world");
		assert_eq!(spliced.applied(), 1);
	}

	#[test]
	fn test_splice_without_edits_is_identity() {
		assert_eq!(Application::default().splice("unchanged"), "unchanged");
	}

	#[test]
	fn test_identical_edit_is_not_counted() {
		let mut buffer = "keep this".to_string();
		let application = application(vec![Edit::replace(0..4, "keep"), Edit::insert(4, "")]);
		assert_eq!(application.apply_to(&mut buffer), 0);
		assert_eq!(buffer, "keep this");
	}

	#[test]
	fn test_spans_point_into_output() {
		let application = application(vec![Edit::replace(0..1, "abc"), Edit::insert(2, "Z")]);
		let spliced = application.splice_tracked("xyz");
		assert_eq!(spliced.text, "abcyZz");
		assert_eq!(spliced.spans, vec![0..3, 4..5]);
	}
}
