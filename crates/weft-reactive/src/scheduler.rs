//! Batch scheduler: Idle, BatchOpen, Flushing.
//!
//! A write opens a batch by handing the scheduler a flush task; the task
//! runs once at the defer boundary. Further writes while the batch is
//! open join it without scheduling anything. An immediate write runs its
//! flush in place and leaves an open batch open, so the deferred task
//! still fires (and finds nothing left to do).
//!
//! The defer primitive is injected: the facade pumps a [`TaskQueue`] on
//! demand, tests substitute [`ImmediateDefer`] to keep ordering
//! assertions synchronous.
//!
//! # Invariants
//!
//! - At most one flush task is scheduled per batch.
//! - `state` is `Flushing` exactly while a flush body runs.
//! - Tasks queued during a pump run within that same pump.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::debug;

/// Scheduler phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    BatchOpen,
    Flushing,
}

/// Deferral primitive standing in for a host microtask queue.
pub trait Defer {
    fn defer(&self, task: Box<dyn FnOnce()>);
}

/// Runs tasks the moment they arrive. Collapses the batch boundary, which
/// makes scheduler ordering testable without a pump.
#[derive(Debug, Default)]
pub struct ImmediateDefer;

impl Defer for ImmediateDefer {
    fn defer(&self, task: Box<dyn FnOnce()>) {
        task();
    }
}

/// Pump-on-demand task queue.
#[derive(Default)]
pub struct TaskQueue {
    tasks: RefCell<VecDeque<Box<dyn FnOnce()>>>,
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("pending", &self.tasks.borrow().len())
            .finish()
    }
}

impl TaskQueue {
    pub fn new() -> TaskQueue {
        TaskQueue::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    /// Run queued tasks until the queue drains, including tasks queued by
    /// the tasks themselves. Returns how many ran.
    pub fn pump(&self) -> usize {
        let mut ran = 0;
        loop {
            let task = self.tasks.borrow_mut().pop_front();
            match task {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }
}

impl Defer for TaskQueue {
    fn defer(&self, task: Box<dyn FnOnce()>) {
        self.tasks.borrow_mut().push_back(task);
    }
}

/// The per-instance batch state machine.
pub struct Scheduler {
    state: Cell<State>,
    defer: Rc<dyn Defer>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler").field("state", &self.state.get()).finish()
    }
}

impl Scheduler {
    pub fn new(defer: Rc<dyn Defer>) -> Rc<Scheduler> {
        Rc::new(Scheduler {
            state: Cell::new(State::Idle),
            defer,
        })
    }

    pub fn state(&self) -> State {
        self.state.get()
    }

    /// Open a batch whose flush runs at the defer boundary. Returns
    /// `false` when a batch is already open or a flush is running; the
    /// write then joins the existing batch.
    pub fn schedule(self: &Rc<Self>, flush: Box<dyn FnOnce()>) -> bool {
        if self.state.get() != State::Idle {
            return false;
        }
        debug!("batch opened");
        self.state.set(State::BatchOpen);
        let scheduler = Rc::clone(self);
        self.defer.defer(Box::new(move || scheduler.run(flush)));
        true
    }

    /// Run a flush in place, bypassing the batch boundary. An open batch
    /// stays open; its deferred task still fires later.
    pub fn flush_now(&self, flush: impl FnOnce()) {
        let prior = self.state.get();
        debug!("immediate flush");
        self.state.set(State::Flushing);
        flush();
        self.state.set(prior);
    }

    fn run(&self, flush: Box<dyn FnOnce()>) {
        debug!("batch flushing");
        self.state.set(State::Flushing);
        flush();
        self.state.set(State::Idle);
        debug!("batch closed");
    }
}
