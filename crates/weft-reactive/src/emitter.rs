//! Keypath-pattern watcher registry.
//!
//! Watchers register under a literal keypath or a pattern: `*` stands for
//! exactly one segment, `**` for one or more. Patterns match against the
//! literal keypath at fire time, never at registration time, so a watcher
//! on `user.*` sees writes to keypaths that did not exist when it was
//! registered. Matched wildcard segments are handed to the watcher as
//! captures, `**` as one dotted capture.
//!
//! # Invariants
//!
//! - Watchers under one pattern fire in registration order.
//! - A `once` watcher is removed before its invocation, so a re-entrant
//!   fire never runs it twice.
//! - The firing set is snapshotted per fire: watchers added or removed by
//!   a running watcher affect the next fire, not the current one. The
//!   registry borrow is released before any watcher runs, so watchers may
//!   re-enter every method.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;
use smallvec::SmallVec;

use weft_core::Value;

/// One observed transition, handed to every matching watcher.
#[derive(Debug)]
pub struct Change<'a> {
    pub keypath: &'a str,
    pub new_value: &'a Value,
    pub old_value: &'a Value,
    /// Wildcard segments matched by the watcher's pattern, in pattern
    /// order. Empty for literal patterns.
    pub captures: &'a [String],
}

/// Shared watcher callback. Identity (`Rc::ptr_eq`) is what `off` uses to
/// remove a specific watcher.
pub type Watcher = Rc<dyn Fn(&Change<'_>)>;

struct Entry {
    watcher: Watcher,
    once: bool,
}

type Captures = SmallVec<[String; 2]>;

/// Watcher registry keyed by pattern.
#[derive(Default)]
pub struct Emitter {
    listeners: RefCell<AHashMap<String, Vec<Entry>>>,
}

impl std::fmt::Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("patterns", &self.listeners.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Emitter {
    pub fn new() -> Emitter {
        Emitter::default()
    }

    /// Register a watcher under a pattern.
    pub fn on(&self, pattern: impl Into<String>, watcher: Watcher) {
        self.listeners
            .borrow_mut()
            .entry(pattern.into())
            .or_default()
            .push(Entry {
                watcher,
                once: false,
            });
    }

    /// Register a watcher that fires at most once.
    pub fn once(&self, pattern: impl Into<String>, watcher: Watcher) {
        self.listeners
            .borrow_mut()
            .entry(pattern.into())
            .or_default()
            .push(Entry { watcher, once: true });
    }

    /// Remove one watcher by identity, or every watcher under the pattern
    /// when `watcher` is `None`.
    pub fn off(&self, pattern: &str, watcher: Option<&Watcher>) {
        let mut listeners = self.listeners.borrow_mut();
        match watcher {
            Some(target) => {
                if let Some(entries) = listeners.get_mut(pattern) {
                    entries.retain(|entry| !Rc::ptr_eq(&entry.watcher, target));
                    if entries.is_empty() {
                        listeners.remove(pattern);
                    }
                }
            }
            None => {
                listeners.remove(pattern);
            }
        }
    }

    /// Drop every watcher. Destroy path.
    pub fn off_all(&self) {
        self.listeners.borrow_mut().clear();
    }

    /// Whether any pattern matches the keypath.
    pub fn has(&self, keypath: &str) -> bool {
        self.listeners
            .borrow()
            .keys()
            .any(|pattern| match_pattern(pattern, keypath).is_some())
    }

    /// Fire every watcher whose pattern matches `keypath`. Returns the
    /// number of watchers invoked.
    pub fn fire(&self, keypath: &str, new_value: &Value, old_value: &Value) -> usize {
        let mut fired: Vec<(Watcher, Captures)> = Vec::new();
        {
            let mut listeners = self.listeners.borrow_mut();
            for (pattern, entries) in listeners.iter_mut() {
                let Some(captures) = match_pattern(pattern, keypath) else {
                    continue;
                };
                for entry in entries.iter() {
                    fired.push((Rc::clone(&entry.watcher), captures.clone()));
                }
                entries.retain(|entry| !entry.once);
            }
            listeners.retain(|_, entries| !entries.is_empty());
        }

        for (watcher, captures) in &fired {
            watcher(&Change {
                keypath,
                new_value,
                old_value,
                captures,
            });
        }
        fired.len()
    }
}

/// Match a pattern against a literal keypath, yielding wildcard captures.
/// Literal patterns must be equal; `*` consumes one segment, `**` one or
/// more (shortest match wins).
fn match_pattern(pattern: &str, keypath: &str) -> Option<Captures> {
    if !pattern.contains('*') {
        return (pattern == keypath).then(Captures::new);
    }
    let pattern: SmallVec<[&str; 8]> = pattern.split('.').collect();
    let path: SmallVec<[&str; 8]> = keypath.split('.').collect();
    let mut captures = Captures::new();
    match_segments(&pattern, &path, &mut captures).then_some(captures)
}

fn match_segments(pattern: &[&str], path: &[&str], captures: &mut Captures) -> bool {
    let Some((head, rest)) = pattern.split_first() else {
        return path.is_empty();
    };
    match *head {
        "**" => {
            for take in 1..=path.len() {
                captures.push(path[..take].join("."));
                if match_segments(rest, &path[take..], captures) {
                    return true;
                }
                captures.pop();
            }
            false
        }
        "*" => {
            let Some((segment, tail)) = path.split_first() else {
                return false;
            };
            captures.push((*segment).to_string());
            if match_segments(rest, tail, captures) {
                return true;
            }
            captures.pop();
            false
        }
        literal => path
            .split_first()
            .is_some_and(|(segment, tail)| *segment == literal && match_segments(rest, tail, captures)),
    }
}
