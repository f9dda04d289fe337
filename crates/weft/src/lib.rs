//! Reactive view rendering: templates in, minimal render-target
//! mutations out.
//!
//! This crate is the assembled engine. The layers underneath each carry
//! one concern: values and keypaths (`weft-core`), expressions
//! (`weft-expr`), template compilation (`weft-template`), virtual nodes
//! and patching (`weft-dom`), the render walk (`weft-render`), watchers
//! and batching (`weft-reactive`). This crate wires them into a
//! [`Component`]: one template, one data tree, one mounted subtree of a
//! [`RenderTarget`].
//!
//! The update cycle in one paragraph: writes through [`Component::set`]
//! land in the data store immediately and log a per-keypath transition
//! while the batch is open; the deferred flush collapses each log to
//! one old/new pair, fires watchers, settles computed values, and
//! re-renders only if a fired keypath is one the last render actually
//! read. Re-renders diff against the previous vnode tree, so the
//! render target sees minimal mutations.
//!
//! Everything is single-threaded `Rc`/`RefCell` state. Instances share
//! filters, partials, component definitions, directive handlers, and
//! the template cache through a [`Registry`].

#![forbid(unsafe_code)]

pub mod component;
pub mod registry;

pub use component::{Component, Options};
pub use registry::{DirectiveBind, Registry, Teardown};

pub use weft_core::{keypath, DepsMap, Lookup, NativeFn, Object, Value};
pub use weft_dom::{
    Hooks, MemoryTarget, NodeRef, OpCounts, Patcher, RenderTarget, VNode,
};
pub use weft_expr::{evaluate, parse, Evaluated, Expr, ExprCache};
pub use weft_reactive::{
    Change, Computed, Defer, Emitter, ImmediateDefer, Scheduler, TaskQueue, Watcher,
};
pub use weft_render::{
    render, DirectiveBinding, NodeFactory, RenderError, StandardFactory,
};
pub use weft_template::{compile, CompileError, Node, TemplateCache};
