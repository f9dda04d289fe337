//! Scoped data frames with memoized lookup.
//!
//! A [`Context`] is a handle onto a chain of frames, one frame per scope
//! level. Entering a loop iteration pushes a frame; leaving pops it.
//! Lookups without level markers walk the chain upward until a keypath
//! resolves; `this`, `.` and `..` pin the frame explicitly and disable
//! the walk.
//!
//! # Invariants
//!
//! - A frame owns its data. Writes through [`Context::set`] never reach
//!   the value the frame was created from.
//! - The keypath in a `Found` result is chain-relative: one `..` term per
//!   ancestor hop, whether the hop came from an explicit marker or from
//!   the lookup walk.
//! - `get` memoizes per frame; `set` invalidates exactly the entry for
//!   the written keypath. Misses are never cached, so a later write makes
//!   the keypath resolvable.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;
use tracing::warn;

use weft_core::keypath::{self, PATH_SEPARATOR};
use weft_core::{KEYPATH_CURRENT, KEYPATH_PARENT, KEYPATH_THIS, Lookup, Value};

#[derive(Debug)]
struct Frame {
    data: RefCell<Value>,
    cache: RefCell<AHashMap<String, Lookup>>,
    parent: Option<Rc<Frame>>,
}

impl Frame {
    fn new(data: Value, parent: Option<Rc<Frame>>) -> Rc<Frame> {
        Rc::new(Frame {
            data: RefCell::new(data),
            cache: RefCell::default(),
            parent,
        })
    }
}

/// A formatted keypath: the frame it addresses, the remaining local
/// segments, the explicit hops consumed, and whether the lookup walk is
/// still allowed.
struct Formatted {
    frame: Rc<Frame>,
    local: String,
    hops: usize,
    lookup: bool,
}

/// Handle onto the current frame of a scope chain.
///
/// Cloning the handle shares the chain; pushing on one clone does not
/// move the other.
#[derive(Debug, Clone)]
pub struct Context {
    frame: Rc<Frame>,
}

impl Context {
    /// Root frame owning `data`.
    pub fn new(data: Value) -> Context {
        Context {
            frame: Frame::new(data, None),
        }
    }

    /// Enter a scope whose frame owns `data`.
    pub fn push(&mut self, data: Value) {
        self.frame = Frame::new(data, Some(Rc::clone(&self.frame)));
    }

    /// Leave the current scope. Returns `false` at the root.
    pub fn pop(&mut self) -> bool {
        match self.frame.parent.clone() {
            Some(parent) => {
                self.frame = parent;
                true
            }
            None => false,
        }
    }

    /// Split level markers off the front of a keypath. Markers use the
    /// slash syntax of chain-relative paths: a whole-string `this`, `.`
    /// or `..`, a `this.` prefix, or any run of leading `./` and `../`
    /// terms. `..` fails when the chain has no frame that far up.
    fn format(&self, keypath: &str) -> Option<Formatted> {
        let mut frame = Rc::clone(&self.frame);

        if keypath == KEYPATH_THIS {
            return Some(Formatted {
                frame,
                local: String::new(),
                hops: 0,
                lookup: false,
            });
        }
        if let Some(rest) = keypath.strip_prefix("this.") {
            return Some(Formatted {
                frame,
                local: keypath::normalize(rest),
                hops: 0,
                lookup: false,
            });
        }

        let mut lookup = true;
        let mut hops = 0;
        let mut rest = keypath;
        loop {
            if rest == KEYPATH_CURRENT {
                lookup = false;
                rest = "";
                break;
            }
            if rest == KEYPATH_PARENT {
                lookup = false;
                frame = frame.parent.clone()?;
                hops += 1;
                rest = "";
                break;
            }
            if let Some(stripped) = rest.strip_prefix("./") {
                lookup = false;
                rest = stripped;
            } else if let Some(stripped) = rest.strip_prefix("../") {
                lookup = false;
                frame = frame.parent.clone()?;
                hops += 1;
                rest = stripped;
            } else {
                break;
            }
        }

        Some(Formatted {
            frame,
            local: keypath::normalize(rest),
            hops,
            lookup,
        })
    }

    /// Resolve a keypath against the chain.
    ///
    /// An empty local keypath (`this`, bare markers) yields the frame's
    /// whole data. A total miss returns `NotFound` carrying the keypath
    /// as requested.
    pub fn get(&self, keypath: &str) -> Lookup {
        let Some(formatted) = self.format(keypath) else {
            warn!(keypath, "keypath walks above the root frame");
            return Lookup::NotFound {
                keypath: keypath.to_string(),
            };
        };
        let Formatted {
            frame,
            local,
            hops,
            lookup,
        } = formatted;

        if local.is_empty() {
            return Lookup::Found {
                keypath: chain_path(hops, ""),
                value: frame.data.borrow().clone(),
            };
        }

        if let Some(hit) = frame.cache.borrow().get(&local) {
            return add_hops(hit.clone(), hops);
        }

        let resolved = if lookup {
            let mut current = Rc::clone(&frame);
            let mut walked = 0;
            loop {
                let value = current.data.borrow().get_keypath(&local).cloned();
                if let Some(value) = value {
                    break Some(Lookup::Found {
                        keypath: chain_path(walked, &local),
                        value,
                    });
                }
                match current.parent.clone() {
                    Some(parent) => {
                        current = parent;
                        walked += 1;
                    }
                    None => break None,
                }
            }
        } else {
            frame
                .data
                .borrow()
                .get_keypath(&local)
                .cloned()
                .map(|value| Lookup::Found {
                    keypath: local.clone(),
                    value,
                })
        };

        match resolved {
            Some(hit) => {
                frame.cache.borrow_mut().insert(local, hit.clone());
                add_hops(hit, hops)
            }
            None => {
                warn!(keypath, "failed to look up keypath");
                Lookup::NotFound {
                    keypath: keypath.to_string(),
                }
            }
        }
    }

    /// Write through to the addressed frame's data, auto-creating
    /// intermediate objects. Empty local keypaths are ignored.
    pub fn set(&self, keypath: &str, value: Value) {
        let Some(formatted) = self.format(keypath) else {
            warn!(keypath, "write walks above the root frame");
            return;
        };
        let Formatted { frame, local, .. } = formatted;
        if local.is_empty() {
            return;
        }
        frame.cache.borrow_mut().remove(&local);
        if !frame.data.borrow_mut().set_keypath(&local, value, true) {
            warn!(keypath, "write did not land on a container value");
        }
    }
}

/// Prefix `hops` parent terms onto a chain-relative keypath.
fn chain_path(hops: usize, rest: &str) -> String {
    let mut out = String::new();
    for _ in 0..hops {
        if !out.is_empty() {
            out.push(PATH_SEPARATOR);
        }
        out.push_str(KEYPATH_PARENT);
    }
    if !rest.is_empty() {
        if !out.is_empty() {
            out.push(PATH_SEPARATOR);
        }
        out.push_str(rest);
    }
    out
}

fn add_hops(hit: Lookup, hops: usize) -> Lookup {
    if hops == 0 {
        return hit;
    }
    match hit {
        Lookup::Found { keypath, value } => Lookup::Found {
            keypath: chain_path(hops, &keypath),
            value,
        },
        miss => miss,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::Object;

    fn chain() -> Context {
        let mut context = Context::new(Value::object([
            ("name", Value::from("outer")),
            ("total", Value::from(9.0)),
        ]));
        context.push(Value::object([("name", Value::from("inner"))]));
        context
    }

    #[test]
    fn get_resolves_in_the_current_frame_first() {
        let context = chain();
        assert_eq!(
            context.get("name"),
            Lookup::Found {
                keypath: "name".into(),
                value: Value::from("inner"),
            }
        );
    }

    #[test]
    fn lookup_walks_ancestors_and_records_the_hops() {
        let context = chain();
        assert_eq!(
            context.get("total"),
            Lookup::Found {
                keypath: "../total".into(),
                value: Value::from(9.0),
            }
        );
    }

    #[test]
    fn parent_marker_pins_the_parent_frame() {
        let context = chain();
        assert_eq!(
            context.get("../name"),
            Lookup::Found {
                keypath: "../name".into(),
                value: Value::from("outer"),
            }
        );
        // Lookup is disabled: the parent frame has no `missing` and the
        // walk must not continue past it.
        assert_eq!(
            context.get("../missing"),
            Lookup::NotFound {
                keypath: "../missing".into(),
            }
        );
    }

    #[test]
    fn this_prefix_pins_the_current_frame() {
        let context = chain();
        assert_eq!(
            context.get("this.total"),
            Lookup::NotFound {
                keypath: "this.total".into(),
            }
        );
    }

    #[test]
    fn this_alone_yields_the_frame_data() {
        let mut context = Context::new(Value::object([("a", Value::from(1.0))]));
        context.push(Value::from("item"));
        assert_eq!(
            context.get("this"),
            Lookup::Found {
                keypath: "".into(),
                value: Value::from("item"),
            }
        );
    }

    #[test]
    fn parent_marker_without_parent_is_a_miss() {
        let context = Context::new(Value::object([("a", Value::from(1.0))]));
        assert_eq!(
            context.get("../a"),
            Lookup::NotFound {
                keypath: "../a".into(),
            }
        );
    }

    #[test]
    fn set_invalidates_the_memoized_entry() {
        let context = chain();
        assert_eq!(context.get("name").value(), Value::from("inner"));
        context.set("name", Value::from("renamed"));
        assert_eq!(context.get("name").value(), Value::from("renamed"));
    }

    #[test]
    fn set_autofills_intermediate_objects() {
        let context = Context::new(Value::Object(Object::default()));
        context.set("a.b.c", Value::from(3.0));
        assert_eq!(context.get("a.b.c").value(), Value::from(3.0));
    }

    #[test]
    fn set_targets_the_parent_through_markers() {
        let context = chain();
        context.set("../total", Value::from(10.0));
        assert_eq!(context.get("total").value(), Value::from(10.0));
        // The inner frame is untouched.
        assert_eq!(context.get("name").value(), Value::from("inner"));
    }

    #[test]
    fn pop_restores_the_parent_frame() {
        let mut context = chain();
        assert!(context.pop());
        assert_eq!(context.get("name").value(), Value::from("outer"));
        assert!(!context.pop());
    }

    #[test]
    fn cloned_handles_share_frame_writes() {
        let context = chain();
        let alias = context.clone();
        context.set("name", Value::from("shared"));
        assert_eq!(alias.get("name").value(), Value::from("shared"));
    }
}
