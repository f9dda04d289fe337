//! Virtual tree and patch engine.
//!
//! A render pass produces a [`VNode`] tree; [`Patcher`] reconciles it
//! against the previously mounted tree through a [`RenderTarget`]
//! adapter, so the engine never touches a concrete tree directly.
//! [`MemoryTarget`] is the in-memory adapter used by tests, with
//! operation counters for patch-minimality assertions.
//!
//! # Invariants
//!
//! - Nodes are reused only on equal key and selector; everything else
//!   replaces.
//! - Insert hooks fire strictly after the patch completes; destroy hooks
//!   fire bottom-up before removal.

#![forbid(unsafe_code)]

pub mod memory;
pub mod modules;
pub mod patch;
pub mod target;
pub mod vnode;

pub use memory::{MemoryTarget, OpCounts};
pub use modules::{default_modules, AttrsModule, DataModule, PropsModule, StyleModule, PROP_INNER_HTML};
pub use patch::Patcher;
pub use target::{NodeRef, RenderTarget};
pub use vnode::{Bag, Hook, Hooks, VData, VNode, SEL_COMMENT};
