//! Tree reconciliation.
//!
//! [`Patcher`] mounts a [`VNode`] tree onto a render target and patches
//! successive trees against it with minimal mutation. Child lists diff
//! with the two-ended keyed algorithm: four cursor comparisons in strict
//! order, then a lazily built key map; leftovers bulk-insert or
//! bulk-remove.
//!
//! # Invariants
//!
//! - A node is reused only when key and selector both match; anything
//!   else is a replace (create, insert before the old node, remove old).
//! - Destroy hooks fire bottom-up before removal; insert hooks queue and
//!   fire strictly after the whole patch completes.
//! - The old tree is consumed; the new tree ends up owning every mounted
//!   handle.

use ahash::AHashMap;
use smallvec::SmallVec;
use tracing::trace;

use crate::modules::{default_modules, DataModule};
use crate::target::{NodeRef, RenderTarget};
use crate::vnode::{Hook, VNode};

type InsertedQueue = SmallVec<[(Hook, NodeRef); 4]>;

/// Patch engine with a registered data-module chain.
pub struct Patcher {
    modules: Vec<Box<dyn DataModule>>,
}

impl Default for Patcher {
    fn default() -> Self {
        Patcher::new()
    }
}

impl Patcher {
    /// Patcher with the built-in attribute, property, and style modules.
    pub fn new() -> Patcher {
        Patcher {
            modules: default_modules(),
        }
    }

    /// Module hooks run in the order given here.
    pub fn with_modules(modules: Vec<Box<dyn DataModule>>) -> Patcher {
        Patcher { modules }
    }

    /// First render: synthesize a vnode wrapper for the bare target root
    /// and patch against it. A vnode whose selector matches the root's
    /// tag adopts it in place.
    pub fn mount(&self, target: &mut dyn RenderTarget, root: NodeRef, vnode: &mut VNode) {
        let mut wrapper = VNode::element(target.tag(root));
        wrapper.children = Some(Vec::new());
        wrapper.node = Some(root);
        self.patch(target, wrapper, vnode);
    }

    /// Reconcile `new` against the previously mounted `old` tree. `old`
    /// is consumed; after the call `new` owns the mounted handles.
    pub fn patch(&self, target: &mut dyn RenderTarget, old: VNode, new: &mut VNode) {
        let mut inserted = InsertedQueue::new();
        if old.patch_compatible(new) {
            self.patch_vnode(target, old, new, &mut inserted);
        } else {
            trace!(old = %old.sel, new = %new.sel, "root replace");
            let parent = old.node.and_then(|el| target.parent(el));
            self.create_node(target, new, &mut inserted);
            if let (Some(parent), Some(el)) = (parent, new.node) {
                target.insert_before(parent, el, old.node);
                self.remove_vnode(target, parent, old);
            }
        }
        for (hook, el) in inserted {
            hook(el);
        }
    }

    /// Create the concrete subtree for a vnode, top-down. The node is
    /// not inserted anywhere; the caller places it.
    fn create_node(
        &self,
        target: &mut dyn RenderTarget,
        vnode: &mut VNode,
        inserted: &mut InsertedQueue,
    ) -> NodeRef {
        if vnode.is_text() {
            let el = target.create_text(vnode.text.as_deref().unwrap_or(""));
            vnode.node = Some(el);
            return el;
        }
        if vnode.is_comment() {
            let el = target.create_comment(vnode.text.as_deref().unwrap_or(""));
            vnode.node = Some(el);
            return el;
        }
        let el = target.create_element(&vnode.sel);
        vnode.node = Some(el);
        if let Some(children) = vnode.children.as_mut() {
            for child in children {
                let child_el = self.create_node(target, child, inserted);
                target.insert_before(el, child_el, None);
            }
        } else if let Some(text) = &vnode.text {
            let text_el = target.create_text(text);
            target.insert_before(el, text_el, None);
        }
        for module in &self.modules {
            module.create(target, el, &vnode.data);
        }
        if let Some(hook) = &vnode.data.hooks.insert {
            inserted.push((hook.clone(), el));
        }
        el
    }

    fn patch_vnode(
        &self,
        target: &mut dyn RenderTarget,
        mut old: VNode,
        new: &mut VNode,
        inserted: &mut InsertedQueue,
    ) {
        let Some(el) = old.node else {
            return;
        };
        if let Some(hook) = &new.data.hooks.prepatch {
            hook(el);
        }
        new.node = Some(el);

        if !old.patch_compatible(new) {
            trace!(old = %old.sel, new = %new.sel, "selector changed, replacing");
            let parent = target.parent(el);
            self.create_node(target, new, inserted);
            if let (Some(parent), Some(new_el)) = (parent, new.node) {
                target.insert_before(parent, new_el, Some(el));
                self.remove_vnode(target, parent, old);
            }
            return;
        }

        for module in &self.modules {
            module.update(target, el, &old.data, &new.data);
        }

        match (&new.text, new.children.as_mut()) {
            (Some(text), _) => {
                if old.text.as_deref() != Some(text.as_str()) {
                    target.set_text(el, text);
                }
            }
            (None, Some(new_children)) => match old.children.take() {
                Some(old_children) => {
                    self.update_children(target, el, old_children, new_children, inserted);
                }
                None => {
                    if old.text.is_some() {
                        target.set_text(el, "");
                    }
                    for child in new_children {
                        let child_el = self.create_node(target, child, inserted);
                        target.insert_before(el, child_el, None);
                    }
                }
            },
            (None, None) => {
                if let Some(old_children) = old.children.take() {
                    for child in old_children {
                        self.remove_vnode(target, el, child);
                    }
                } else if old.text.is_some() {
                    target.set_text(el, "");
                }
            }
        }

        if let Some(hook) = &new.data.hooks.postpatch {
            hook(el);
        }
    }

    /// Two-ended keyed diff over one sibling list.
    fn update_children(
        &self,
        target: &mut dyn RenderTarget,
        parent: NodeRef,
        old_children: Vec<VNode>,
        new_children: &mut [VNode],
        inserted: &mut InsertedQueue,
    ) {
        let mut old: Vec<Option<VNode>> = old_children.into_iter().map(Some).collect();
        let mut old_start: isize = 0;
        let mut old_end: isize = old.len() as isize - 1;
        let mut new_start: isize = 0;
        let mut new_end: isize = new_children.len() as isize - 1;
        let mut key_index: Option<AHashMap<String, usize>> = None;

        while old_start <= old_end && new_start <= new_end {
            // Slots nulled by a key-map move are skipped, not re-diffed.
            if old[old_start as usize].is_none() {
                old_start += 1;
            } else if old[old_end as usize].is_none() {
                old_end -= 1;
            } else if slot_compatible(&old[old_start as usize], &new_children[new_start as usize]) {
                if let Some(node) = old[old_start as usize].take() {
                    self.patch_vnode(target, node, &mut new_children[new_start as usize], inserted);
                }
                old_start += 1;
                new_start += 1;
            } else if slot_compatible(&old[old_end as usize], &new_children[new_end as usize]) {
                if let Some(node) = old[old_end as usize].take() {
                    self.patch_vnode(target, node, &mut new_children[new_end as usize], inserted);
                }
                old_end -= 1;
                new_end -= 1;
            } else if slot_compatible(&old[old_start as usize], &new_children[new_end as usize]) {
                // Head moved to the tail.
                let anchor = old[old_end as usize].as_ref().and_then(|v| v.node);
                if let Some(node) = old[old_start as usize].take() {
                    self.patch_vnode(target, node, &mut new_children[new_end as usize], inserted);
                    let reference = anchor.and_then(|a| target.next_sibling(a));
                    if let Some(el) = new_children[new_end as usize].node {
                        target.insert_before(parent, el, reference);
                    }
                }
                old_start += 1;
                new_end -= 1;
            } else if slot_compatible(&old[old_end as usize], &new_children[new_start as usize]) {
                // Tail moved to the head.
                let reference = old[old_start as usize].as_ref().and_then(|v| v.node);
                if let Some(node) = old[old_end as usize].take() {
                    self.patch_vnode(target, node, &mut new_children[new_start as usize], inserted);
                    if let Some(el) = new_children[new_start as usize].node {
                        target.insert_before(parent, el, reference);
                    }
                }
                old_end -= 1;
                new_start += 1;
            } else {
                let index = key_index.get_or_insert_with(|| {
                    build_key_index(&old, old_start as usize, old_end as usize)
                });
                let found = new_children[new_start as usize]
                    .key
                    .as_ref()
                    .and_then(|key| index.get(key).copied());
                let reference = old[old_start as usize].as_ref().and_then(|v| v.node);
                match found.and_then(|at| old[at].take()) {
                    Some(node) => {
                        trace!(key = ?new_children[new_start as usize].key, "keyed move");
                        self.patch_vnode(
                            target,
                            node,
                            &mut new_children[new_start as usize],
                            inserted,
                        );
                    }
                    None => {
                        trace!(sel = %new_children[new_start as usize].sel, "keyed create");
                        self.create_node(target, &mut new_children[new_start as usize], inserted);
                    }
                }
                if let Some(el) = new_children[new_start as usize].node {
                    target.insert_before(parent, el, reference);
                }
                new_start += 1;
            }
        }

        if old_start > old_end {
            // Leftover new children land before the node after final
            // new-end, or at the end when there is none.
            let reference = usize::try_from(new_end + 1)
                .ok()
                .and_then(|at| new_children.get(at))
                .and_then(|v| v.node);
            for at in new_start..=new_end {
                let child = &mut new_children[at as usize];
                self.create_node(target, child, inserted);
                if let Some(el) = child.node {
                    target.insert_before(parent, el, reference);
                }
            }
        } else if new_start > new_end {
            for slot in &mut old[old_start as usize..=old_end as usize] {
                if let Some(node) = slot.take() {
                    self.remove_vnode(target, parent, node);
                }
            }
        }
    }

    fn remove_vnode(&self, target: &mut dyn RenderTarget, parent: NodeRef, vnode: VNode) {
        let Some(el) = vnode.node else {
            return;
        };
        if !vnode.is_text() {
            self.destroy_vnode(&vnode);
        }
        target.remove_child(parent, el);
    }

    /// Fire destroy hooks, deepest first.
    fn destroy_vnode(&self, vnode: &VNode) {
        if let Some(children) = &vnode.children {
            for child in children {
                self.destroy_vnode(child);
            }
        }
        if let (Some(hook), Some(el)) = (&vnode.data.hooks.destroy, vnode.node) {
            hook(el);
        }
    }
}

fn slot_compatible(slot: &Option<VNode>, new: &VNode) -> bool {
    slot.as_ref().is_some_and(|old| old.patch_compatible(new))
}

fn build_key_index(old: &[Option<VNode>], start: usize, end: usize) -> AHashMap<String, usize> {
    let mut index = AHashMap::new();
    for (at, slot) in old.iter().enumerate().take(end + 1).skip(start) {
        if let Some(key) = slot.as_ref().and_then(|v| v.key.clone()) {
            index.insert(key, at);
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTarget;
    use std::cell::RefCell;
    use std::rc::Rc;
    use weft_core::Value;

    fn keyed(sel: &str, key: &str) -> VNode {
        let mut node = VNode::element(sel);
        node.key = Some(key.to_string());
        node
    }

    fn list(children: Vec<VNode>) -> VNode {
        let mut node = VNode::element("ul");
        node.children = Some(children);
        node
    }

    fn mounted(
        target: &mut MemoryTarget,
        patcher: &Patcher,
        mut vnode: VNode,
    ) -> (NodeRef, VNode) {
        let root = target.create_root(&vnode.sel);
        patcher.mount(target, root, &mut vnode);
        (root, vnode)
    }

    #[test]
    fn mount_builds_the_tree_under_the_root() {
        let mut target = MemoryTarget::new();
        let patcher = Patcher::new();
        let mut tree = VNode::element("div");
        tree.data.attrs.insert("class".into(), Value::from("card"));
        let mut span = VNode::element("span");
        span.text = Some("hi".into());
        tree.children = Some(vec![span, VNode::text("!")]);

        let (root, _) = mounted(&mut target, &patcher, tree);
        assert_eq!(
            target.markup(root),
            "<div class=\"card\"><span>hi</span>!</div>"
        );
    }

    #[test]
    fn text_patch_writes_only_on_change() {
        let mut target = MemoryTarget::new();
        let patcher = Patcher::new();
        let mut old = VNode::element("p");
        old.text = Some("one".into());
        let (root, old) = mounted(&mut target, &patcher, old);
        target.ops.reset();

        let mut same = VNode::element("p");
        same.text = Some("one".into());
        patcher.patch(&mut target, old, &mut same);
        assert_eq!(target.ops.text_writes, 0);

        let mut changed = VNode::element("p");
        changed.text = Some("two".into());
        patcher.patch(&mut target, same, &mut changed);
        assert_eq!(target.ops.text_writes, 1);
        assert_eq!(target.text_of(root), "two");
    }

    #[test]
    fn selector_mismatch_replaces_even_with_equal_keys() {
        let mut target = MemoryTarget::new();
        let patcher = Patcher::new();
        let body = target.create_root("body");
        let (root, old_tree) = {
            let root = target.create_element("div");
            target.insert_before(body, root, None);
            let mut tree = VNode::element("div");
            patcher.mount(&mut target, root, &mut tree);
            (root, tree)
        };
        target.ops.reset();

        let mut new_tree = VNode::element("section");
        patcher.patch(&mut target, old_tree, &mut new_tree);

        assert_eq!(target.markup(body), "<body><section></section></body>");
        assert_eq!(target.ops.created, 1);
        assert_eq!(target.ops.removed, 1);
        assert_ne!(new_tree.node, Some(root));
    }

    #[test]
    fn rotation_moves_one_node_and_creates_none() {
        let mut target = MemoryTarget::new();
        let patcher = Patcher::new();
        let old = list(vec![keyed("li", "a"), keyed("li", "b"), keyed("li", "c")]);
        let (root, old) = mounted(&mut target, &patcher, old);
        target.ops.reset();

        let mut new = list(vec![keyed("li", "c"), keyed("li", "a"), keyed("li", "b")]);
        patcher.patch(&mut target, old, &mut new);

        assert_eq!(target.ops.created, 0);
        assert_eq!(target.ops.removed, 0);
        assert_eq!(target.ops.moved, 1);
        let order: Vec<_> = new.children.as_ref().unwrap().iter().map(|c| c.node).collect();
        let actual: Vec<_> = target.children_of(root).iter().map(|c| Some(*c)).collect();
        assert_eq!(order, actual);
    }

    #[test]
    fn keyed_shuffle_reuses_every_node() {
        let mut target = MemoryTarget::new();
        let patcher = Patcher::new();
        let old = list(vec![
            keyed("li", "a"),
            keyed("li", "b"),
            keyed("li", "c"),
            keyed("li", "d"),
        ]);
        let (root, old) = mounted(&mut target, &patcher, old);
        target.ops.reset();

        let mut new = list(vec![
            keyed("li", "d"),
            keyed("li", "b"),
            keyed("li", "a"),
            keyed("li", "c"),
        ]);
        patcher.patch(&mut target, old, &mut new);

        assert_eq!(target.ops.created, 0);
        assert_eq!(target.ops.removed, 0);
        let order: Vec<_> = new.children.as_ref().unwrap().iter().map(|c| c.node).collect();
        let actual: Vec<_> = target.children_of(root).iter().map(|c| Some(*c)).collect();
        assert_eq!(order, actual);
    }

    #[test]
    fn new_child_in_the_middle_is_created_in_place() {
        let mut target = MemoryTarget::new();
        let patcher = Patcher::new();
        let old = list(vec![keyed("li", "a"), keyed("li", "b")]);
        let (root, old) = mounted(&mut target, &patcher, old);
        target.ops.reset();

        let mut new = list(vec![keyed("li", "a"), keyed("li", "x"), keyed("li", "b")]);
        patcher.patch(&mut target, old, &mut new);

        assert_eq!(target.ops.created, 1);
        assert_eq!(target.ops.removed, 0);
        let order: Vec<_> = new.children.as_ref().unwrap().iter().map(|c| c.node).collect();
        let actual: Vec<_> = target.children_of(root).iter().map(|c| Some(*c)).collect();
        assert_eq!(order, actual);
    }

    #[test]
    fn vanished_children_are_removed() {
        let mut target = MemoryTarget::new();
        let patcher = Patcher::new();
        let old = list(vec![keyed("li", "a"), keyed("li", "b"), keyed("li", "c")]);
        let (root, old) = mounted(&mut target, &patcher, old);
        target.ops.reset();

        let mut new = list(vec![keyed("li", "b")]);
        patcher.patch(&mut target, old, &mut new);

        assert_eq!(target.ops.removed, 2);
        assert_eq!(target.children_of(root).len(), 1);
    }

    #[test]
    fn text_and_children_swap_both_ways() {
        let mut target = MemoryTarget::new();
        let patcher = Patcher::new();
        let mut old = VNode::element("div");
        old.text = Some("plain".into());
        let (root, old) = mounted(&mut target, &patcher, old);

        let mut with_children = VNode::element("div");
        with_children.children = Some(vec![keyed("span", "s")]);
        patcher.patch(&mut target, old, &mut with_children);
        assert_eq!(target.markup(root), "<div><span></span></div>");

        let mut back_to_text = VNode::element("div");
        back_to_text.text = Some("again".into());
        patcher.patch(&mut target, with_children, &mut back_to_text);
        assert_eq!(target.markup(root), "<div>again</div>");
    }

    #[test]
    fn insert_hook_fires_once_after_the_patch() {
        let mut target = MemoryTarget::new();
        let patcher = Patcher::new();
        let events = Rc::new(RefCell::new(Vec::new()));

        let log = events.clone();
        let mut child = VNode::element("span");
        child.data.hooks.insert = Some(Rc::new(move |el| log.borrow_mut().push(el)));
        let mut tree = VNode::element("div");
        tree.children = Some(vec![child]);

        let (_, old) = mounted(&mut target, &patcher, tree);
        assert_eq!(events.borrow().len(), 1);

        let mut again = VNode::element("div");
        again.children = Some(vec![VNode::element("span")]);
        patcher.patch(&mut target, old, &mut again);
        assert_eq!(events.borrow().len(), 1);
    }

    #[test]
    fn destroy_hooks_fire_bottom_up() {
        let mut target = MemoryTarget::new();
        let patcher = Patcher::new();
        let events = Rc::new(RefCell::new(Vec::new()));

        let inner_log = events.clone();
        let mut inner = VNode::element("b");
        inner.data.hooks.destroy = Some(Rc::new(move |_| inner_log.borrow_mut().push("inner")));
        let outer_log = events.clone();
        let mut outer = VNode::element("span");
        outer.data.hooks.destroy = Some(Rc::new(move |_| outer_log.borrow_mut().push("outer")));
        outer.children = Some(vec![inner]);
        let mut tree = VNode::element("div");
        tree.children = Some(vec![outer]);

        let (_, old) = mounted(&mut target, &patcher, tree);
        let mut empty = VNode::element("div");
        empty.children = Some(Vec::new());
        patcher.patch(&mut target, old, &mut empty);

        assert_eq!(*events.borrow(), vec!["inner", "outer"]);
    }

    #[test]
    fn comment_vnode_mounts_as_comment() {
        let mut target = MemoryTarget::new();
        let patcher = Patcher::new();
        let mut tree = VNode::element("div");
        tree.children = Some(vec![VNode::comment("placeholder")]);
        let (root, _) = mounted(&mut target, &patcher, tree);
        assert_eq!(target.markup(root), "<div><!--placeholder--></div>");
    }
}
