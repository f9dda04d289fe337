//! Render-target adapter.
//!
//! The patch engine never touches a concrete tree directly; every
//! mutation goes through [`RenderTarget`]. Nodes are addressed by opaque
//! [`NodeRef`] handles owned by the target.

use weft_core::Value;

/// Opaque handle to a concrete node owned by a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef(pub u64);

/// The mutation surface the patch engine is written against.
///
/// Structural methods mirror the usual tree API: `insert_before` with a
/// `None` reference appends; inserting a node that already has a parent
/// detaches it first (a move, not a copy).
pub trait RenderTarget {
    fn create_element(&mut self, tag: &str) -> NodeRef;
    fn create_text(&mut self, text: &str) -> NodeRef;
    fn create_comment(&mut self, text: &str) -> NodeRef;

    fn insert_before(&mut self, parent: NodeRef, node: NodeRef, reference: Option<NodeRef>);
    fn remove_child(&mut self, parent: NodeRef, child: NodeRef);
    fn replace_child(&mut self, parent: NodeRef, new_node: NodeRef, old_node: NodeRef);

    /// Replace the node's content with plain text.
    fn set_text(&mut self, node: NodeRef, text: &str);
    /// Replace the node's content with raw markup.
    fn set_inner_html(&mut self, node: NodeRef, html: &str);

    fn set_attribute(&mut self, node: NodeRef, name: &str, value: &str);
    fn remove_attribute(&mut self, node: NodeRef, name: &str);
    fn set_property(&mut self, node: NodeRef, name: &str, value: &Value);
    fn remove_property(&mut self, node: NodeRef, name: &str);
    fn set_style(&mut self, node: NodeRef, name: &str, value: &str);
    fn remove_style(&mut self, node: NodeRef, name: &str);

    fn parent(&self, node: NodeRef) -> Option<NodeRef>;
    fn next_sibling(&self, node: NodeRef) -> Option<NodeRef>;
    /// Tag name, lowercase; empty for text and comment nodes.
    fn tag(&self, node: NodeRef) -> String;
}
