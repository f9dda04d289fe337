#![forbid(unsafe_code)]

//! Core data model for weft.
//!
//! This crate is the leaf of the workspace: the dynamic [`Value`] type that
//! flows through expression evaluation and rendering, the keypath utilities
//! that address values inside nested data, and the [`Lookup`] result type
//! returned by scoped resolution.
//!
//! # Invariants
//!
//! - `Value::Object` preserves insertion order; iteration over an object is
//!   deterministic across renders.
//! - Keypath normalization is idempotent: `normalize(normalize(s)) ==
//!   normalize(s)`.
//! - `Lookup` never carries a value for `NotFound`; absence is explicit, not
//!   an `Undefined` convention.

pub mod keypath;
pub mod value;

pub use keypath::{KEYPATH_CURRENT, KEYPATH_PARENT, KEYPATH_SEPARATOR, KEYPATH_THIS};
pub use value::{NativeFn, Object, Value};

use ahash::AHashMap;

/// Dependency map accumulated during a render pass or expression
/// evaluation: absolute keypath to the value observed for it.
pub type DepsMap = AHashMap<String, Value>;

/// Result of a scoped keypath resolution.
///
/// `Found` carries the chain-relative keypath actually used (ancestor hops
/// are surfaced as `../` prefixes) so dependency bookkeeping can re-anchor
/// it. `NotFound` carries the keypath as requested; callers decide how to
/// degrade.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found { keypath: String, value: Value },
    NotFound { keypath: String },
}

impl Lookup {
    /// The resolved value, or `Undefined` on a miss.
    pub fn value(&self) -> Value {
        match self {
            Lookup::Found { value, .. } => value.clone(),
            Lookup::NotFound { .. } => Value::Undefined,
        }
    }

    /// The keypath this resolution should be recorded under.
    pub fn keypath(&self) -> &str {
        match self {
            Lookup::Found { keypath, .. } | Lookup::NotFound { keypath } => keypath,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found { .. })
    }
}
