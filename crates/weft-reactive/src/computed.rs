//! Computed values: lazily cached derivations keyed by keypath.
//!
//! A computed registers a getter (and optionally a setter) under a
//! keypath. Its dependency set is captured on every run through a capture
//! stack: whoever resolves data calls [`ComputedRegistry::record`] for
//! each keypath read, and the frame pushed around the getter collects
//! them. Explicitly declared dependencies skip the capture entirely.
//!
//! # Invariants
//!
//! - A cached computed never re-runs its getter until invalidated.
//! - Nested evaluation is safe: each getter run gets its own capture
//!   frame, and a read of computed `b` inside computed `a` lands in `a`'s
//!   frame because the recording happens before `b` evaluates.
//! - `evaluate` reports the dependency delta so the caller can move its
//!   invalidation watchers, and the prior cached value so the caller can
//!   log the transition.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ahash::AHashMap;
use tracing::debug;

use weft_core::Value;

pub type Getter = Rc<dyn Fn() -> Value>;
pub type Setter = Rc<dyn Fn(&Value)>;

/// A computed definition. Built with [`Computed::new`] plus the builder
/// methods, then handed to [`ComputedRegistry::define`].
pub struct Computed {
    getter: Getter,
    setter: Option<Setter>,
    cache: bool,
    explicit_deps: Option<Vec<String>>,
}

impl std::fmt::Debug for Computed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("cache", &self.cache)
            .field("explicit_deps", &self.explicit_deps)
            .finish()
    }
}

impl Computed {
    pub fn new(getter: impl Fn() -> Value + 'static) -> Computed {
        Computed {
            getter: Rc::new(getter),
            setter: None,
            cache: true,
            explicit_deps: None,
        }
    }

    /// Route writes to this keypath through `setter`.
    pub fn setter(mut self, setter: impl Fn(&Value) + 'static) -> Computed {
        self.setter = Some(Rc::new(setter));
        self
    }

    /// Re-run the getter on every evaluation instead of caching.
    pub fn uncached(mut self) -> Computed {
        self.cache = false;
        self
    }

    /// Declare the dependency set instead of capturing it.
    pub fn deps(mut self, deps: impl IntoIterator<Item = impl Into<String>>) -> Computed {
        self.explicit_deps = Some(deps.into_iter().map(Into::into).collect());
        self
    }
}

/// Dependency delta between two getter runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepsChange {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// Result of one [`ComputedRegistry::evaluate`] call.
#[derive(Debug)]
pub struct Evaluation {
    pub value: Value,
    /// Cached value replaced by this run. `None` on a cache hit and on
    /// the first run.
    pub old: Option<Value>,
    /// Set when the captured dependency set changed, including the first
    /// run (everything added).
    pub deps: Option<DepsChange>,
}

struct Entry {
    computed: Computed,
    dirty: Cell<bool>,
    cached: RefCell<Option<Value>>,
    captured: RefCell<Vec<String>>,
}

/// Computeds of one instance, plus the shared capture stack.
#[derive(Default)]
pub struct ComputedRegistry {
    entries: RefCell<AHashMap<String, Rc<Entry>>>,
    stack: RefCell<Vec<Vec<String>>>,
}

impl std::fmt::Debug for ComputedRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputedRegistry")
            .field("keypaths", &self.entries.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ComputedRegistry {
    pub fn new() -> ComputedRegistry {
        ComputedRegistry::default()
    }

    pub fn define(&self, keypath: impl Into<String>, computed: Computed) {
        self.entries.borrow_mut().insert(
            keypath.into(),
            Rc::new(Entry {
                computed,
                dirty: Cell::new(false),
                cached: RefCell::new(None),
                // Starts empty even for explicit deps so the first run
                // reports them all as added.
                captured: RefCell::new(Vec::new()),
            }),
        );
    }

    pub fn contains(&self, keypath: &str) -> bool {
        self.entries.borrow().contains_key(keypath)
    }

    pub fn keypaths(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }

    /// Current dependency set of a computed, `None` for plain keypaths.
    pub fn deps(&self, keypath: &str) -> Option<Vec<String>> {
        let entry = self.entries.borrow().get(keypath).cloned()?;
        let deps = entry.captured.borrow().clone();
        Some(deps)
    }

    /// Note a keypath read into the innermost open capture frame. No-op
    /// outside getter evaluation.
    pub fn record(&self, keypath: &str) {
        if let Some(frame) = self.stack.borrow_mut().last_mut() {
            if !frame.iter().any(|dep| dep == keypath) {
                frame.push(keypath.to_string());
            }
        }
    }

    /// Mark a computed dirty. Returns `false` for unknown keypaths.
    pub fn invalidate(&self, keypath: &str) -> bool {
        match self.entries.borrow().get(keypath) {
            Some(entry) => {
                entry.dirty.set(true);
                true
            }
            None => false,
        }
    }

    /// Run or serve the computed under `keypath`. `None` when the keypath
    /// has no computed.
    pub fn evaluate(&self, keypath: &str) -> Option<Evaluation> {
        let entry = self.entries.borrow().get(keypath).cloned()?;

        if !entry.dirty.get() && entry.computed.cache {
            if let Some(value) = entry.cached.borrow().clone() {
                return Some(Evaluation {
                    value,
                    old: None,
                    deps: None,
                });
            }
        }
        entry.dirty.set(false);
        debug!(keypath, "computed getter runs");

        let explicit = entry.computed.explicit_deps.is_some();
        if !explicit {
            self.stack.borrow_mut().push(Vec::new());
        }
        let value = (entry.computed.getter)();
        let new_deps = if explicit {
            entry.computed.explicit_deps.clone().unwrap_or_default()
        } else {
            self.stack.borrow_mut().pop().unwrap_or_default()
        };

        let old_deps = entry.captured.replace(new_deps.clone());
        let deps = (new_deps != old_deps || entry.cached.borrow().is_none()).then(|| DepsChange {
            added: new_deps
                .iter()
                .filter(|dep| !old_deps.contains(dep))
                .cloned()
                .collect(),
            removed: old_deps
                .iter()
                .filter(|dep| !new_deps.contains(dep))
                .cloned()
                .collect(),
        });
        let old = entry.cached.replace(Some(value.clone()));

        Some(Evaluation { value, old, deps })
    }

    /// Route a write through the computed's setter. Returns `false` when
    /// the keypath has no computed or the computed has no setter.
    pub fn set(&self, keypath: &str, value: &Value) -> bool {
        let entry = self.entries.borrow().get(keypath).cloned();
        match entry.and_then(|entry| entry.computed.setter.clone()) {
            Some(setter) => {
                setter(value);
                true
            }
            None => false,
        }
    }

    /// Drop every computed. Destroy path and test isolation.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
        self.stack.borrow_mut().clear();
    }
}
