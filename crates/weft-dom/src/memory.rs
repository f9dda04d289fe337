//! In-memory render target.
//!
//! [`MemoryTarget`] is an arena-backed tree implementing [`RenderTarget`]
//! with operation counters, so tests can assert patch minimality ("one
//! move, zero creations") instead of eyeballing output. [`markup`]
//! serializes a subtree for shape assertions.
//!
//! [`markup`]: MemoryTarget::markup

use std::fmt::Write as _;

use weft_core::Value;

use crate::target::{NodeRef, RenderTarget};
use crate::vnode::Bag;

/// Mutation counters, bumped by every adapter call that changes the tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpCounts {
    pub created: usize,
    pub removed: usize,
    /// Re-insertions of a node that was already attached somewhere.
    pub moved: usize,
    pub text_writes: usize,
    pub attr_writes: usize,
}

impl OpCounts {
    pub fn reset(&mut self) {
        *self = OpCounts::default();
    }
}

#[derive(Debug, Clone, PartialEq)]
enum MemKind {
    Element(String),
    Text,
    Comment,
}

#[derive(Debug, Clone)]
struct MemNode {
    kind: MemKind,
    text: String,
    attrs: Bag<String>,
    props: Bag<Value>,
    style: Bag<String>,
    html: Option<String>,
    parent: Option<NodeRef>,
    children: Vec<NodeRef>,
}

impl MemNode {
    fn new(kind: MemKind) -> MemNode {
        MemNode {
            kind,
            text: String::new(),
            attrs: Bag::default(),
            props: Bag::default(),
            style: Bag::default(),
            html: None,
            parent: None,
            children: Vec::new(),
        }
    }
}

/// Arena tree with operation counting.
#[derive(Debug, Default)]
pub struct MemoryTarget {
    nodes: Vec<MemNode>,
    pub ops: OpCounts,
}

impl MemoryTarget {
    pub fn new() -> MemoryTarget {
        MemoryTarget::default()
    }

    /// A detached element to mount a tree into.
    pub fn create_root(&mut self, tag: &str) -> NodeRef {
        self.create_element(tag)
    }

    fn alloc(&mut self, node: MemNode) -> NodeRef {
        self.nodes.push(node);
        self.ops.created += 1;
        NodeRef(self.nodes.len() as u64 - 1)
    }

    fn node(&self, id: NodeRef) -> &MemNode {
        &self.nodes[id.0 as usize]
    }

    fn node_mut(&mut self, id: NodeRef) -> &mut MemNode {
        &mut self.nodes[id.0 as usize]
    }

    fn detach(&mut self, id: NodeRef) {
        if let Some(parent) = self.node(id).parent {
            self.node_mut(parent).children.retain(|c| *c != id);
            self.node_mut(id).parent = None;
        }
    }

    pub fn children_of(&self, id: NodeRef) -> &[NodeRef] {
        &self.node(id).children
    }

    pub fn text_of(&self, id: NodeRef) -> &str {
        &self.node(id).text
    }

    pub fn attr(&self, id: NodeRef, name: &str) -> Option<&str> {
        self.node(id).attrs.get(name).map(String::as_str)
    }

    pub fn prop(&self, id: NodeRef, name: &str) -> Option<&Value> {
        self.node(id).props.get(name)
    }

    pub fn style_of(&self, id: NodeRef, name: &str) -> Option<&str> {
        self.node(id).style.get(name).map(String::as_str)
    }

    pub fn html_of(&self, id: NodeRef) -> Option<&str> {
        self.node(id).html.as_deref()
    }

    /// Serialize a subtree as markup for shape assertions.
    pub fn markup(&self, id: NodeRef) -> String {
        let mut out = String::new();
        self.write_markup(id, &mut out);
        out
    }

    fn write_markup(&self, id: NodeRef, out: &mut String) {
        let node = self.node(id);
        match &node.kind {
            MemKind::Text => out.push_str(&node.text),
            MemKind::Comment => {
                let _ = write!(out, "<!--{}-->", node.text);
            }
            MemKind::Element(tag) => {
                let _ = write!(out, "<{tag}");
                for (name, value) in &node.attrs {
                    let _ = write!(out, " {name}=\"{value}\"");
                }
                if !node.style.is_empty() {
                    out.push_str(" style=\"");
                    for (name, value) in &node.style {
                        let _ = write!(out, "{name}: {value};");
                    }
                    out.push('"');
                }
                out.push('>');
                if let Some(html) = &node.html {
                    out.push_str(html);
                } else if node.children.is_empty() {
                    out.push_str(&node.text);
                } else {
                    for child in &node.children {
                        self.write_markup(*child, out);
                    }
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }
}

impl RenderTarget for MemoryTarget {
    fn create_element(&mut self, tag: &str) -> NodeRef {
        self.alloc(MemNode::new(MemKind::Element(tag.to_string())))
    }

    fn create_text(&mut self, text: &str) -> NodeRef {
        let mut node = MemNode::new(MemKind::Text);
        node.text = text.to_string();
        self.alloc(node)
    }

    fn create_comment(&mut self, text: &str) -> NodeRef {
        let mut node = MemNode::new(MemKind::Comment);
        node.text = text.to_string();
        self.alloc(node)
    }

    fn insert_before(&mut self, parent: NodeRef, node: NodeRef, reference: Option<NodeRef>) {
        if self.node(node).parent.is_some() {
            self.ops.moved += 1;
        }
        self.detach(node);
        let children = &mut self.node_mut(parent).children;
        let at = reference
            .and_then(|r| children.iter().position(|c| *c == r))
            .unwrap_or(children.len());
        children.insert(at, node);
        self.node_mut(node).parent = Some(parent);
    }

    fn remove_child(&mut self, parent: NodeRef, child: NodeRef) {
        if self.node(child).parent == Some(parent) {
            self.detach(child);
            self.ops.removed += 1;
        }
    }

    fn replace_child(&mut self, parent: NodeRef, new_node: NodeRef, old_node: NodeRef) {
        self.detach(new_node);
        let children = &mut self.node_mut(parent).children;
        match children.iter().position(|c| *c == old_node) {
            Some(at) => {
                children[at] = new_node;
                self.node_mut(old_node).parent = None;
                self.node_mut(new_node).parent = Some(parent);
                self.ops.removed += 1;
            }
            None => self.insert_before(parent, new_node, None),
        }
    }

    fn set_text(&mut self, node: NodeRef, text: &str) {
        let children = std::mem::take(&mut self.node_mut(node).children);
        for child in children {
            self.node_mut(child).parent = None;
        }
        let entry = self.node_mut(node);
        entry.html = None;
        entry.text = text.to_string();
        self.ops.text_writes += 1;
    }

    fn set_inner_html(&mut self, node: NodeRef, html: &str) {
        let children = std::mem::take(&mut self.node_mut(node).children);
        for child in children {
            self.node_mut(child).parent = None;
        }
        let entry = self.node_mut(node);
        entry.text = String::new();
        entry.html = Some(html.to_string());
    }

    fn set_attribute(&mut self, node: NodeRef, name: &str, value: &str) {
        self.node_mut(node)
            .attrs
            .insert(name.to_string(), value.to_string());
        self.ops.attr_writes += 1;
    }

    fn remove_attribute(&mut self, node: NodeRef, name: &str) {
        self.node_mut(node).attrs.shift_remove(name);
        self.ops.attr_writes += 1;
    }

    fn set_property(&mut self, node: NodeRef, name: &str, value: &Value) {
        self.node_mut(node)
            .props
            .insert(name.to_string(), value.clone());
    }

    fn remove_property(&mut self, node: NodeRef, name: &str) {
        self.node_mut(node).props.shift_remove(name);
    }

    fn set_style(&mut self, node: NodeRef, name: &str, value: &str) {
        self.node_mut(node)
            .style
            .insert(name.to_string(), value.to_string());
    }

    fn remove_style(&mut self, node: NodeRef, name: &str) {
        self.node_mut(node).style.shift_remove(name);
    }

    fn parent(&self, node: NodeRef) -> Option<NodeRef> {
        self.node(node).parent
    }

    fn next_sibling(&self, node: NodeRef) -> Option<NodeRef> {
        let parent = self.node(node).parent?;
        let children = &self.node(parent).children;
        let at = children.iter().position(|c| *c == node)?;
        children.get(at + 1).copied()
    }

    fn tag(&self, node: NodeRef) -> String {
        match &self.node(node).kind {
            MemKind::Element(tag) => tag.clone(),
            MemKind::Text | MemKind::Comment => String::new(),
        }
    }
}
