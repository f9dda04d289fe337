//! Template scanner and compiler.
//!
//! [`compile`] turns template source into a forest of [`Node`]s in one
//! forward pass: a main scanner splits the source on tag boundaries and
//! a helper scanner splits the text between tags on `{{ }}` delimiter
//! boundaries. [`TemplateCache`] shares compiled forests across callers
//! keyed by exact source text.
//!
//! # Invariants
//!
//! - Compilation never looks behind the cursor; both scanners only move
//!   forward.
//! - A compiled forest preserves document order, with `if`/`else if`/
//!   `else` branches of one chain as consecutive siblings.
//! - Errors carry a [`Position`] locating the offending source text.

#![forbid(unsafe_code)]

pub mod compile;
pub mod node;
pub mod scan;

pub use compile::{compile, CompileError, Position, TemplateCache};
pub use node::{
    Attribute, Directive, Each, Element, Else, ElseIf, If, Node, Partial, DIRECTIVE_EVENT,
    DIRECTIVE_KEY, DIRECTIVE_LAZY, DIRECTIVE_MODEL, DIRECTIVE_REF,
};
pub use scan::{Hit, Pattern, Scanner};
