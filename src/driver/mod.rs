//! Running a rule set over one source file.
//!
//! The driver owns the buffer: it reads the file once, hands the buffer to
//! each rule in registry order, and writes the result back at most once.
//! A rule that finds nothing is recorded as skipped; it never stops the run.

pub mod io;

use crate::error::Result;
use crate::rules::{Registry, RewriteRule};
use std::fmt;
use std::path::{Path, PathBuf};

pub use io::{read_source, write_atomic};

/// Whether a rule changed the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleStatus {
	/// The rule rewrote this many spans.
	Applied { rewrites: usize },

	/// Nothing matched.
	Skipped,
}

/// Outcome of one rule in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
	pub rule: String,
	pub status: RuleStatus,
	pub warnings: Vec<String>,
}

impl RuleOutcome {
	pub fn applied(&self) -> bool {
		matches!(self.status, RuleStatus::Applied { .. })
	}
}

impl fmt::Display for RuleOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.status {
			RuleStatus::Applied { rewrites: 1 } => write!(f, "Updated {}", self.rule)?,
			RuleStatus::Applied { rewrites } => {
				write!(f, "Updated {} ({} sites)", self.rule, rewrites)?
			}
			RuleStatus::Skipped => write!(f, "Skipped {} (no match)", self.rule)?,
		}
		for warning in &self.warnings {
			write!(f, "\n  warning: {}", warning)?;
		}
		Ok(())
	}
}

/// Apply one rule to the buffer, replacing only the spans it matched.
///
/// Only edits that change the text count as rewrites; a rule whose edits all
/// reproduce the text already there is skipped.
pub fn apply_rule(rule: &RewriteRule, buffer: &mut String) -> RuleOutcome {
	let application = rule.action.apply(buffer);
	let rewrites = application.apply_to(buffer);
	let mut warnings = Vec::new();

	if rule.action.is_global() && rewrites > 0 && application.already_rewritten > 0 {
		let warning = format!(
			"{} site(s) already had the rewritten shape; check that every call of this shape belongs to the migration",
			application.already_rewritten
		);
		tracing::warn!(rule = %rule.name, already = application.already_rewritten, "shape not unique to migration");
		warnings.push(warning);
	}

	if application.rematched > 0 {
		let warning = format!(
			"{} rewritten site(s) match the pattern again; the rule will fire on every run",
			application.rematched
		);
		tracing::warn!(rule = %rule.name, rematched = application.rematched, "rewrite is not idempotent here");
		warnings.push(warning);
	}

	let status = if rewrites == 0 {
		tracing::debug!(rule = %rule.name, kind = rule.action.kind().as_str(), "no match");
		RuleStatus::Skipped
	} else {
		tracing::debug!(rule = %rule.name, rewrites, "applied");
		RuleStatus::Applied { rewrites }
	};

	RuleOutcome {
		rule: rule.name.clone(),
		status,
		warnings,
	}
}

/// Apply `rules` in the order given, each to the output of the one before.
pub fn apply_in_order<'a>(
	rules: impl IntoIterator<Item = &'a RewriteRule>,
	buffer: &mut String,
) -> Vec<RuleOutcome> {
	rules
		.into_iter()
		.map(|rule| apply_rule(rule, buffer))
		.collect()
}

/// Apply every rule of `registry` in its resolved order.
pub fn apply(registry: &Registry, buffer: &mut String) -> Vec<RuleOutcome> {
	apply_in_order(registry.iter(), buffer)
}

/// Summary of a run over one file.
#[derive(Debug, Clone)]
pub struct RunReport {
	pub path: PathBuf,
	pub outcomes: Vec<RuleOutcome>,

	/// The final buffer differs from the file as read.
	pub changed: bool,

	/// The file was overwritten.
	pub written: bool,
}

impl RunReport {
	pub fn applied(&self) -> impl Iterator<Item = &RuleOutcome> {
		self.outcomes.iter().filter(|o| o.applied())
	}
}

impl fmt::Display for RunReport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for outcome in &self.outcomes {
			writeln!(f, "{}", outcome)?;
		}
		let applied = self.applied().count();
		write!(
			f,
			"\n{} of {} rules applied",
			applied,
			self.outcomes.len()
		)?;
		match (self.changed, self.written) {
			(true, true) => writeln!(f, "; wrote {}", self.path.display()),
			(true, false) => writeln!(f, "; dry run, {} not written", self.path.display()),
			(false, _) => writeln!(f, "; {} unchanged", self.path.display()),
		}
	}
}

/// Runs a registry against a file.
#[derive(Debug)]
pub struct Driver<'a> {
	registry: &'a Registry,
	dry_run: bool,
}

impl<'a> Driver<'a> {
	pub fn new(registry: &'a Registry) -> Self {
		Driver {
			registry,
			dry_run: false,
		}
	}

	/// Compute the report without writing the file.
	pub fn dry_run(mut self, dry_run: bool) -> Self {
		self.dry_run = dry_run;
		self
	}

	/// Read `path`, apply every rule, and write the result back if it changed.
	pub fn run(&self, path: &Path) -> Result<RunReport> {
		let original = read_source(path)?;
		let mut buffer = original.clone();

		tracing::debug!(path = %path.display(), rules = self.registry.len(), "applying rules");
		let outcomes = apply(self.registry, &mut buffer);

		let changed = buffer != original;
		let written = changed && !self.dry_run;
		if written {
			write_atomic(path, &buffer)?;
			tracing::info!(path = %path.display(), "wrote rewritten source");
		}

		Ok(RunReport {
			path: path.to_path_buf(),
			outcomes,
			changed,
			written,
		})
	}
}
