//! Reactive plumbing: watchers, write batching, computed values.
//!
//! The pieces compose into the update cycle the facade drives: writes
//! land in a [`WatchCache`] log while a [`Scheduler`] batch is open, the
//! flush collapses each log to one transition and fires the [`Emitter`],
//! and [`ComputedRegistry`] keeps derived keypaths cached until a fired
//! watcher invalidates them.
//!
//! Everything here is single-threaded `Rc`/`RefCell` state; no type in
//! this crate is `Send` or `Sync`.

#![forbid(unsafe_code)]

pub mod cache;
pub mod computed;
pub mod emitter;
pub mod scheduler;

pub use cache::WatchCache;
pub use computed::{Computed, ComputedRegistry, DepsChange, Evaluation, Getter, Setter};
pub use emitter::{Change, Emitter, Watcher};
pub use scheduler::{Defer, ImmediateDefer, Scheduler, State, TaskQueue};
