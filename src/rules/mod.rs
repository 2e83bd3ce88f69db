//! Structural matching and rewriting for weave.
//!
//! This module handles:
//! - Lexing source text into tokens, ignoring whitespace and comments
//! - Match templates with named capture slots
//! - Injecting statements at the top of matched function bodies
//! - Rewriting call-site arguments and template substitutions
//! - The ordered rule registry

pub mod callsite;
pub mod edit;
pub mod injector;
pub mod lexer;
pub mod matcher;
pub mod registry;
pub mod rewriter;
pub mod template;

pub use callsite::{InsertArg, ReplaceArg, Snippet};
pub use edit::{Application, Edit};
pub use injector::{BodyTemplate, Injection};
pub use matcher::{Captures, Match, Matcher};
pub use registry::{Action, Registry, RewriteRule, compile_rules};
pub use rewriter::Substitution;
pub use template::{Replacement, SlotKind, Template};
