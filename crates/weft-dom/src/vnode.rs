//! Virtual nodes.
//!
//! A [`VNode`] describes one node of the desired tree: a selector, an
//! optional diff key, either text or children, and an associated-data bag
//! of attributes, properties, styles, and lifecycle hooks. The comment
//! sentinel selector is [`SEL_COMMENT`].
//!
//! # Invariants
//!
//! - `text` and `children` are mutually exclusive; an empty selector
//!   means a text node.
//! - `node` is `None` until the patch engine mounts the vnode, then holds
//!   the concrete render-target handle.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use weft_core::Value;

use crate::target::NodeRef;

/// Selector of the comment sentinel vnode.
pub const SEL_COMMENT: &str = "!";

/// Insertion-ordered associated-data map.
pub type Bag<V> = IndexMap<String, V, ahash::RandomState>;

/// Lifecycle callback. Receives the concrete render-target handle the
/// vnode is mounted on.
pub type Hook = Rc<dyn Fn(NodeRef)>;

/// Per-vnode lifecycle hooks.
///
/// `insert` fires once, strictly after the whole patch completes.
/// `prepatch`/`postpatch` bracket a single-node patch. `destroy` fires
/// bottom-up while the subtree is being torn down.
#[derive(Clone, Default)]
pub struct Hooks {
    pub prepatch: Option<Hook>,
    pub postpatch: Option<Hook>,
    pub insert: Option<Hook>,
    pub destroy: Option<Hook>,
}

impl Hooks {
    pub fn is_empty(&self) -> bool {
        self.prepatch.is_none()
            && self.postpatch.is_none()
            && self.insert.is_none()
            && self.destroy.is_none()
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("prepatch", &self.prepatch.is_some())
            .field("postpatch", &self.postpatch.is_some())
            .field("insert", &self.insert.is_some())
            .field("destroy", &self.destroy.is_some())
            .finish()
    }
}

/// Associated data carried by an element vnode, diffed by the registered
/// data modules.
#[derive(Debug, Clone, Default)]
pub struct VData {
    pub attrs: Bag<Value>,
    pub props: Bag<Value>,
    pub style: Bag<String>,
    pub hooks: Hooks,
}

/// One node of the virtual tree.
#[derive(Debug, Clone, Default)]
pub struct VNode {
    /// Element selector; empty for text nodes, `!` for comments.
    pub sel: String,
    /// Diff identity within a sibling list.
    pub key: Option<String>,
    pub text: Option<String>,
    pub children: Option<Vec<VNode>>,
    pub data: VData,
    /// Concrete node adopted at mount time.
    pub node: Option<NodeRef>,
}

impl VNode {
    pub fn element(sel: impl Into<String>) -> VNode {
        VNode {
            sel: sel.into(),
            ..VNode::default()
        }
    }

    pub fn text(content: impl Into<String>) -> VNode {
        VNode {
            text: Some(content.into()),
            ..VNode::default()
        }
    }

    pub fn comment(content: impl Into<String>) -> VNode {
        VNode {
            sel: SEL_COMMENT.to_string(),
            text: Some(content.into()),
            ..VNode::default()
        }
    }

    pub fn is_text(&self) -> bool {
        self.sel.is_empty()
    }

    pub fn is_comment(&self) -> bool {
        self.sel == SEL_COMMENT
    }

    /// Whether `other` may be patched onto this node in place: equal key
    /// and equal selector. Anything else is a replace.
    pub fn patch_compatible(&self, other: &VNode) -> bool {
        self.key == other.key && self.sel == other.sel
    }
}
