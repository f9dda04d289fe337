//! The render walk: AST forest and data in, vnode forest and dependency
//! map out.
//!
//! Each node is visited once per pass. Branches and loops evaluate their
//! expressions against the [`Context`] chain; every dependency a read
//! records is re-anchored to the loop keypath in effect at the read, so
//! the pass-wide map holds absolute keypaths only.
//!
//! # Invariants
//!
//! - A failed branch emits a placeholder comment only outside attribute
//!   regions, and only when a following sibling exists that does not
//!   continue the chain.
//! - A successful branch consumes its `else if`/`else` siblings even
//!   when it rendered nothing.
//! - Partials registered during the pass are visible to later imports in
//!   the same pass only.
//!
//! # Failure Modes
//!
//! | Operation | Degenerate input | Behavior |
//! |---|---|---|
//! | `each` | non-iterable value | node skipped, no output |
//! | spread | non-object value | node skipped, no output |
//! | import | unresolvable name | `RenderError::UnknownPartial` |
//! | expression | lookup miss | `Undefined`, miss recorded in deps |

use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use smallvec::{SmallVec, smallvec};
use tracing::warn;

use weft_core::keypath::{self, Segments};
use weft_core::{DepsMap, Lookup, Value};
use weft_dom::{Bag, PROP_INNER_HTML, VNode};
use weft_expr::{EvalError, Evaluated, Expr, Scope, evaluate};
use weft_template::{CompileError, Each, Element, Node, compile};

use crate::context::Context;
use crate::factory::{Binding, DirectiveBinding, ElementOut, NodeFactory, PartialSource};

/// Keypath exposed to expressions as the current loop position.
pub const SPECIAL_KEYPATH: &str = "$keypath";

/// Result of one render pass.
#[derive(Debug)]
pub struct RenderOutput {
    pub nodes: Vec<VNode>,
    pub deps: DepsMap,
}

#[derive(Debug)]
pub enum RenderError {
    /// An import named a partial no registry could resolve.
    UnknownPartial { name: String },
    /// A string partial failed to compile.
    Compile(CompileError),
    /// An expression failed to evaluate.
    Eval(EvalError),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::UnknownPartial { name } => write!(f, "unknown partial {name:?}"),
            RenderError::Compile(err) => write!(f, "partial failed to compile: {err}"),
            RenderError::Eval(err) => write!(f, "expression failed to evaluate: {err}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Compile(err) => Some(err),
            RenderError::Eval(err) => Some(err),
            RenderError::UnknownPartial { .. } => None,
        }
    }
}

/// Render an AST forest against `data`.
///
/// Top-level text and expression content becomes text vnodes; stray
/// attribute records outside an element are dropped.
pub fn render(
    ast: &[Node],
    data: Value,
    factory: &mut dyn NodeFactory,
) -> Result<RenderOutput, RenderError> {
    let mut walk = Walk {
        factory,
        context: Context::new(data),
        keys: Segments::new(),
        partials: AHashMap::default(),
        deps: DepsMap::default(),
        in_attribute: false,
    };
    let parts = walk.render_list(ast)?;

    let mut nodes = Vec::new();
    for part in parts {
        match part {
            Rendered::Node(node) => nodes.push(node),
            Rendered::Content(value) => nodes.push(VNode::text(value.to_string())),
            Rendered::Attr(_) | Rendered::Dir(_) => {}
        }
    }
    Ok(RenderOutput {
        nodes,
        deps: walk.deps,
    })
}

/// One rendered fragment. Lists of these flow upward through the walk
/// until an element or the pass root consumes them.
#[derive(Debug)]
enum Rendered {
    Content(Value),
    Node(VNode),
    Attr(Binding),
    Dir(DirectiveBinding),
}

type Parts = SmallVec<[Rendered; 4]>;

struct Walk<'a> {
    factory: &'a mut dyn NodeFactory,
    context: Context,
    keys: Segments,
    partials: AHashMap<String, Rc<Vec<Node>>>,
    deps: DepsMap,
    in_attribute: bool,
}

impl Walk<'_> {
    fn anchor(&self) -> String {
        keypath::stringify(&self.keys)
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, RenderError> {
        let anchor = self.anchor();
        let scope = RenderScope {
            context: &self.context,
            keypath: &anchor,
        };
        let Evaluated { value, deps } = evaluate(expr, &scope).map_err(RenderError::Eval)?;
        for (key, observed) in deps {
            self.deps.insert(keypath::resolve(&anchor, &key), observed);
        }
        Ok(value)
    }

    fn render_list(&mut self, nodes: &[Node]) -> Result<Parts, RenderError> {
        let mut out = Parts::new();
        let mut i = 0;
        while i < nodes.len() {
            let node = &nodes[i];
            if let Some(parts) = self.render_node(node, nodes.get(i + 1))? {
                out.extend(parts);
                if node.opens_branch() {
                    // The taken branch consumes the rest of the chain.
                    while nodes.get(i + 1).is_some_and(|n| n.continues_branch()) {
                        i += 1;
                    }
                }
            }
            i += 1;
        }
        Ok(out)
    }

    /// `None` means the node produced nothing and does not consume a
    /// branch chain; `Some` output does, even when empty.
    fn render_node(
        &mut self,
        node: &Node,
        next: Option<&Node>,
    ) -> Result<Option<Parts>, RenderError> {
        match node {
            Node::Text { content } => Ok(Some(smallvec![Rendered::Content(Value::from(
                content.as_str()
            ))])),
            Node::Expression { expr, .. } => {
                let value = self.eval(expr)?;
                Ok(Some(smallvec![Rendered::Content(value)]))
            }
            Node::Attribute(attr) => {
                let value = self.attribute_value(&attr.children)?;
                Ok(Some(smallvec![Rendered::Attr(Binding {
                    name: attr.name.clone(),
                    keypath: self.anchor(),
                    value,
                })]))
            }
            Node::Directive(dir) => {
                let value = self.attribute_value(&dir.children)?;
                Ok(Some(smallvec![Rendered::Dir(DirectiveBinding {
                    name: dir.name.clone(),
                    modifier: dir.modifier.clone(),
                    keypath: self.anchor(),
                    value,
                })]))
            }
            Node::Spread { expr } => {
                let value = self.eval(expr)?;
                let keypath = self.anchor();
                match value {
                    Value::Object(map) => Ok(Some(
                        map.into_iter()
                            .map(|(name, value)| {
                                Rendered::Attr(Binding {
                                    name,
                                    keypath: keypath.clone(),
                                    value,
                                })
                            })
                            .collect(),
                    )),
                    other => {
                        warn!(value = other.type_name(), "spread expects an object");
                        Ok(None)
                    }
                }
            }
            Node::Partial(partial) => {
                self.partials
                    .insert(partial.name.clone(), Rc::new(partial.children.clone()));
                Ok(None)
            }
            Node::Import { name } => self.render_import(name).map(Some),
            Node::If(branch) => self.render_branch(&branch.expr, &branch.children, next),
            Node::ElseIf(branch) => self.render_branch(&branch.expr, &branch.children, next),
            Node::Else(branch) => self.render_list(&branch.children).map(Some),
            Node::Each(each) => self.render_each(each),
            Node::Element(element) => self.render_element(element).map(Some),
        }
    }

    fn render_branch(
        &mut self,
        expr: &Expr,
        children: &[Node],
        next: Option<&Node>,
    ) -> Result<Option<Parts>, RenderError> {
        if self.eval(expr)?.truthy() {
            return self.render_list(children).map(Some);
        }
        // Keep sibling indexing stable for the diff, unless the chain
        // continues or we are inside an attribute value.
        let placeholder = !self.in_attribute && next.is_some_and(|n| !n.continues_branch());
        if placeholder {
            Ok(Some(smallvec![Rendered::Node(self.factory.comment())]))
        } else {
            Ok(None)
        }
    }

    fn render_each(&mut self, each: &Each) -> Result<Option<Parts>, RenderError> {
        let value = self.eval(&each.expr)?;

        let items: Vec<(String, Value, Value)> = match &value {
            Value::Array(list) => list
                .iter()
                .enumerate()
                .map(|(i, item)| (i.to_string(), Value::from(i), item.clone()))
                .collect(),
            Value::Object(map) => map
                .iter()
                .map(|(key, item)| (key.clone(), Value::from(key.clone()), item.clone()))
                .collect(),
            other => {
                warn!(value = other.type_name(), "each expects an array or object");
                return Ok(None);
            }
        };

        // The collection frame hosts the index variable. Arrays cannot
        // hold a named key, so they get an empty object host instead.
        let host = match (&each.index, &value) {
            (Some(_), Value::Array(_)) => Value::object([] as [(String, Value); 0]),
            _ => value.clone(),
        };
        self.keys.push(keypath::normalize(&each.expr.to_source()));
        self.context.push(host);

        let mut out = Parts::new();
        let mut failed = None;
        for (label, position, item) in items {
            if let Some(index) = &each.index {
                self.context.set(index, position);
            }
            self.keys.push(label);
            self.context.push(item);
            let parts = self.render_list(&each.children);
            self.context.pop();
            self.keys.pop();
            match parts {
                Ok(list) => out.extend(list),
                Err(err) => {
                    failed = Some(err);
                    break;
                }
            }
        }

        self.context.pop();
        self.keys.pop();
        match failed {
            Some(err) => Err(err),
            None => Ok(Some(out)),
        }
    }

    fn render_import(&mut self, name: &str) -> Result<Parts, RenderError> {
        if let Some(children) = self.partials.get(name).map(Rc::clone) {
            return self.render_list(&children);
        }
        match self.factory.resolve_partial(name) {
            Some(PartialSource::Text(text)) => {
                let forest = compile(&text).map_err(RenderError::Compile)?;
                self.render_list(&forest)
            }
            Some(PartialSource::Forest(nodes)) => self.render_list(&nodes),
            None => Err(RenderError::UnknownPartial {
                name: name.to_string(),
            }),
        }
    }

    fn attribute_value(&mut self, children: &[Node]) -> Result<Value, RenderError> {
        let was = self.in_attribute;
        self.in_attribute = true;
        let parts = self.render_list(children);
        self.in_attribute = was;
        Ok(merge_parts(parts?))
    }

    fn render_element(&mut self, element: &Element) -> Result<Parts, RenderError> {
        let mut props: Bag<Value> = Bag::default();
        let mut children = Vec::new();

        // A lone raw expression child collapses to a markup property.
        match element.children.as_slice() {
            [Node::Expression { expr, safe: false }] => {
                props.insert(PROP_INNER_HTML.to_string(), self.eval(expr)?);
            }
            nodes => {
                for part in self.render_list(nodes)? {
                    match part {
                        Rendered::Node(node) => children.push(node),
                        Rendered::Content(value) => children.push(VNode::text(value.to_string())),
                        Rendered::Attr(_) | Rendered::Dir(_) => {}
                    }
                }
            }
        }

        let mut attributes = Vec::new();
        let mut directives = Vec::new();
        for part in self.render_list(&element.attrs)? {
            match part {
                Rendered::Attr(binding) => attributes.push(binding),
                Rendered::Dir(directive) => {
                    if !directive.name.is_empty() && directive.modifier.as_deref() != Some("") {
                        directives.push(directive);
                    }
                }
                Rendered::Content(_) | Rendered::Node(_) => {}
            }
        }

        let node = self.factory.element(ElementOut {
            name: element.name.clone(),
            component: element.component,
            keypath: self.anchor(),
            props,
            attributes,
            directives,
            children,
        });
        Ok(smallvec![Rendered::Node(node)])
    }
}

/// Collapse an attribute's rendered parts into one value. A single
/// expression part keeps its type; mixed parts concatenate as text.
fn merge_parts(mut parts: Parts) -> Value {
    match parts.len() {
        0 => Value::from(""),
        1 => match parts.remove(0) {
            Rendered::Content(value) => value,
            _ => Value::from(""),
        },
        _ => {
            let mut text = String::new();
            for part in parts {
                if let Rendered::Content(value) = part {
                    text.push_str(&value.to_string());
                }
            }
            Value::from(text)
        }
    }
}

struct RenderScope<'a> {
    context: &'a Context,
    keypath: &'a str,
}

impl Scope for RenderScope<'_> {
    fn get(&self, keypath: &str) -> Lookup {
        if keypath == SPECIAL_KEYPATH {
            return Lookup::Found {
                keypath: keypath.to_string(),
                value: Value::from(self.keypath),
            };
        }
        self.context.get(keypath)
    }
}
