//! Render kernel: scoped context frames and the template walk.
//!
//! A compiled template forest plus a data [`Value`] goes in; a vnode
//! forest plus the dependency map of every keypath the pass touched
//! comes out. Loops push context frames, expressions evaluate against
//! the frame chain, and all host-specific assembly routes through the
//! [`NodeFactory`] seam.
//!
//! # Invariants
//!
//! - Dependency keypaths are anchored to the root frame: loop segments
//!   and ancestor hops recorded by lookups are resolved into one
//!   root-relative keypath before landing in the map.
//! - The walk never mutates the caller's data value; frames own copies.
//!
//! [`Value`]: weft_core::Value

#![forbid(unsafe_code)]

pub mod context;
pub mod factory;
pub mod render;

pub use context::Context;
pub use factory::{
    parse_style, Binding, DirectiveBinding, ElementOut, NodeFactory, PartialSource,
    StandardFactory,
};
pub use render::{render, RenderError, RenderOutput, SPECIAL_KEYPATH};
