//! Output records of the render walk and the node factory seam.
//!
//! The walk itself is host-agnostic: element assembly, placeholder
//! comments, and external partial resolution route through a
//! [`NodeFactory`]. [`StandardFactory`] covers plain elements; a host
//! with component and directive machinery supplies its own.

use std::rc::Rc;

use weft_core::Value;
use weft_dom::{Bag, VNode};
use weft_template::{DIRECTIVE_KEY, Node};

/// A rendered attribute: final name and value, tagged with the loop
/// keypath it was rendered under.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: String,
    pub keypath: String,
    pub value: Value,
}

/// A rendered directive. `on-click` arrives as name `event`, modifier
/// `click`.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveBinding {
    pub name: String,
    pub modifier: Option<String>,
    pub keypath: String,
    pub value: Value,
}

/// Everything the walk knows about an element by the time it leaves it.
#[derive(Debug)]
pub struct ElementOut {
    pub name: String,
    pub component: bool,
    pub keypath: String,
    /// Direct property assignments; raw-markup collapse lands here.
    pub props: Bag<Value>,
    pub attributes: Vec<Binding>,
    pub directives: Vec<DirectiveBinding>,
    pub children: Vec<VNode>,
}

/// Source of an imported partial that the local registry did not cover.
#[derive(Debug, Clone)]
pub enum PartialSource {
    /// Raw template text, compiled before splicing.
    Text(String),
    /// A pre-compiled forest, spliced as-is.
    Forest(Rc<Vec<Node>>),
}

/// Host hooks invoked by the render walk.
pub trait NodeFactory {
    /// Assemble an element (or component placeholder) vnode.
    fn element(&mut self, out: ElementOut) -> VNode;

    /// Placeholder comment standing in for a skipped branch.
    fn comment(&mut self) -> VNode {
        VNode::comment("")
    }

    /// Resolve a partial name not found in the local registry.
    fn resolve_partial(&mut self, _name: &str) -> Option<PartialSource> {
        None
    }
}

/// Plain-element factory: attributes land in the vnode attr bag, the
/// `style` attribute parses into the style bag, the `key` directive
/// becomes the vnode key. Other directives need a host and are dropped.
/// Components render as bare `div` placeholders.
#[derive(Debug, Default)]
pub struct StandardFactory;

impl NodeFactory for StandardFactory {
    fn element(&mut self, out: ElementOut) -> VNode {
        let mut node = if out.component {
            VNode::element("div")
        } else {
            VNode::element(out.name)
        };
        node.data.props = out.props;
        if !out.component {
            for binding in out.attributes {
                if binding.name == "style" {
                    node.data.style = parse_style(&binding.value.to_string());
                } else {
                    node.data.attrs.insert(binding.name, binding.value);
                }
            }
        }
        for directive in out.directives {
            if directive.name == DIRECTIVE_KEY {
                node.key = Some(directive.value.to_string());
            }
        }
        node.children = Some(out.children);
        node
    }
}

/// Parse an inline `style` attribute into a style bag. Keys camel-case
/// (`font-size` becomes `fontSize`); entries missing a key or value are
/// dropped.
pub fn parse_style(text: &str) -> Bag<String> {
    let mut bag = Bag::default();
    for item in text.split(';') {
        let Some((key, value)) = item.split_once(':') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || value.is_empty() {
            continue;
        }
        bag.insert(camel_case(key), value.to_string());
    }
    bag
}

fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for ch in name.chars() {
        if ch == '-' {
            upper = true;
        } else if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_style_camel_cases_keys() {
        let bag = parse_style("color: red; font-size: 12px");
        assert_eq!(bag.get("color").map(String::as_str), Some("red"));
        assert_eq!(bag.get("fontSize").map(String::as_str), Some("12px"));
    }

    #[test]
    fn parse_style_drops_incomplete_entries() {
        let bag = parse_style("color:; : red; border");
        assert!(bag.is_empty());
    }

    #[test]
    fn standard_factory_routes_style_key_and_attrs() {
        let out = ElementOut {
            name: "li".into(),
            component: false,
            keypath: String::new(),
            props: Bag::default(),
            attributes: vec![
                Binding {
                    name: "id".into(),
                    keypath: String::new(),
                    value: Value::from("row"),
                },
                Binding {
                    name: "style".into(),
                    keypath: String::new(),
                    value: Value::from("color: red"),
                },
            ],
            directives: vec![DirectiveBinding {
                name: DIRECTIVE_KEY.into(),
                modifier: None,
                keypath: String::new(),
                value: Value::from("a"),
            }],
            children: Vec::new(),
        };
        let node = StandardFactory.element(out);
        assert_eq!(node.sel, "li");
        assert_eq!(node.key.as_deref(), Some("a"));
        assert_eq!(node.data.attrs.get("id"), Some(&Value::from("row")));
        assert_eq!(
            node.data.style.get("color").map(String::as_str),
            Some("red")
        );
    }

    #[test]
    fn components_become_placeholder_divs_without_attrs() {
        let out = ElementOut {
            name: "Profile".into(),
            component: true,
            keypath: String::new(),
            props: Bag::default(),
            attributes: vec![Binding {
                name: "user".into(),
                keypath: String::new(),
                value: Value::from("x"),
            }],
            directives: Vec::new(),
            children: Vec::new(),
        };
        let node = StandardFactory.element(out);
        assert_eq!(node.sel, "div");
        assert!(node.data.attrs.is_empty());
    }
}
