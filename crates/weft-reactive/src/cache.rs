//! Per-keypath pending write logs.
//!
//! A batch of writes lands here before the flush. Each keypath keeps the
//! full value log for the open batch; collapsing reduces it to the first
//! entry (the value before the batch) and the last (the value after), so
//! watchers observe one transition per batch, never the intermediates.
//!
//! # Invariants
//!
//! - The first value recorded for a keypath stays the batch-wide old
//!   value, however many writes follow.
//! - Keys drain in first-write order.

use std::cell::RefCell;

use ahash::AHashMap;
use smallvec::SmallVec;

use weft_core::Value;

type Log = SmallVec<[Value; 4]>;

/// Pending value logs for one open batch.
#[derive(Debug, Default)]
pub struct WatchCache {
    entries: RefCell<AHashMap<String, Log>>,
    order: RefCell<Vec<String>>,
}

impl WatchCache {
    pub fn new() -> WatchCache {
        WatchCache::default()
    }

    /// Record one write. The first record for a keypath seeds the log
    /// with `old`, the value read before the write landed.
    pub fn record(&self, keypath: &str, old: &Value, new: Value) {
        let mut entries = self.entries.borrow_mut();
        match entries.get_mut(keypath) {
            Some(log) => log.push(new),
            None => {
                let mut log = Log::new();
                log.push(old.clone());
                log.push(new);
                entries.insert(keypath.to_string(), log);
                self.order.borrow_mut().push(keypath.to_string());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Keypaths with pending writes, in first-write order.
    pub fn keys(&self) -> Vec<String> {
        self.order.borrow().clone()
    }

    /// Collapse and remove one keypath's log, yielding `(old, new)`.
    /// Callers decide whether the pair is a real transition.
    pub fn take(&self, keypath: &str) -> Option<(Value, Value)> {
        let mut log = self.entries.borrow_mut().remove(keypath)?;
        self.order.borrow_mut().retain(|key| key != keypath);
        let new = log.pop()?;
        let old = log.swap_remove(0);
        Some((old, new))
    }

    /// Drop every pending log. Destroy path.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
        self.order.borrow_mut().clear();
    }
}
