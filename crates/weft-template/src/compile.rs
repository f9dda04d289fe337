//! Template compilation.
//!
//! [`compile`] turns template text into a [`Node`] forest. The main
//! scanner walks tag boundaries; the text between them runs through a
//! helper scanner that splits on `{{ }}` delimiters. A stack of open
//! nodes governs attachment: a finished node attaches to the element
//! attribute list while a tag body is open, otherwise to the top of
//! stack's children, otherwise to the root forest.
//!
//! # Invariants
//!
//! - Nodes attach to their parent when they close, so sibling order is
//!   document order.
//! - Text consisting only of a line break is dropped; other text sheds
//!   one leading and one trailing indentation-bearing line break.
//! - A quoted attribute value stays open across delimiter boundaries:
//!   `a="x{{b}}y"` yields one attribute with three value parts.
//!
//! # Failure Modes
//!
//! | Input | Behavior |
//! |---|---|
//! | `<div>` without `</div>` | `CompileError::UnclosedBlock` |
//! | `</span>` with `<div>` open | `CompileError::UnexpectedClosingTag` |
//! | `{{else}}` with no `#if` open | `CompileError::UnexpectedBranch` |
//! | `{{#if}}` with no condition | `CompileError::ExpectedExpression` |
//! | `{{1 +}}` | `CompileError::Expression` wrapping the parse error |

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use memchr::memchr;
use tracing::trace;
use weft_expr::{ExprCache, ParseError};

use crate::node::{
    Attribute, Directive, Each, Element, Else, ElseIf, If, Node, Partial, DIRECTIVE_EVENT,
    DIRECTIVE_KEY, DIRECTIVE_LAZY, DIRECTIVE_MODEL, DIRECTIVE_REF,
};
use crate::scan::{ClosingDelimiter, ClosingTag, OpeningDelimiter, OpeningTag, Scanner};

/// Condition block opener.
pub const SYNTAX_IF: &str = "#if";
/// Condition chain continuation with a new condition.
pub const SYNTAX_ELSE_IF: &str = "else if";
/// Condition chain fallback.
pub const SYNTAX_ELSE: &str = "else";
/// Iteration block opener, optionally suffixed `:indexName`.
pub const SYNTAX_EACH: &str = "#each";
/// Named partial definition block.
pub const SYNTAX_PARTIAL: &str = "#partial";
/// Partial reference sigil.
pub const SYNTAX_IMPORT: &str = ">";
/// Comment sigil; the marker contributes nothing.
pub const SYNTAX_COMMENT: &str = ":";
/// Object spread sigil inside a tag body.
pub const SYNTAX_SPREAD: &str = "...";

/// Event directive spelling: `on-click` and friends.
pub const DIRECTIVE_EVENT_PREFIX: &str = "on-";
/// Custom directive spelling: `o-anything`.
pub const DIRECTIVE_CUSTOM_PREFIX: &str = "o-";

/// Line and column of a byte offset, derived by re-walking newlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn locate(source: &str, offset: usize) -> Position {
        let offset = offset.min(source.len());
        let mut line = 1;
        let mut line_start = 0;
        for (index, byte) in source.bytes().enumerate().take(offset) {
            if byte == b'\n' {
                line += 1;
                line_start = index + 1;
            }
        }
        Position {
            offset,
            line,
            column: offset - line_start + 1,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, col {}", self.line, self.column)
    }
}

/// Compilation failure. All variants are terminal for the template.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    /// A `<` that looked like a tag never resolved to one.
    IllegalTag { position: Position },
    /// A closing tag that does not match the open element.
    UnexpectedClosingTag { tag: String, position: Position },
    /// End of template with a tag or block still open.
    UnclosedBlock { name: String, position: Position },
    /// `{{/...}}` with nothing open.
    UnexpectedBlockEnd { position: Position },
    /// `else` / `else if` without a preceding branch.
    UnexpectedBranch { branch: String, position: Position },
    /// A marker that requires an expression got none.
    ExpectedExpression { position: Position },
    /// An embedded expression failed to parse.
    Expression {
        source: String,
        error: ParseError,
        position: Position,
    },
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::IllegalTag { position } => {
                write!(f, "illegal tag at {position}")
            }
            CompileError::UnexpectedClosingTag { tag, position } => {
                write!(f, "unexpected closing tag `</{tag}>` at {position}")
            }
            CompileError::UnclosedBlock { name, position } => {
                write!(f, "unclosed `{name}` at {position}")
            }
            CompileError::UnexpectedBlockEnd { position } => {
                write!(f, "block close with nothing open at {position}")
            }
            CompileError::UnexpectedBranch { branch, position } => {
                write!(f, "`{branch}` without an open `#if` at {position}")
            }
            CompileError::ExpectedExpression { position } => {
                write!(f, "expected expression at {position}")
            }
            CompileError::Expression { error, position, .. } => {
                write!(f, "invalid expression at {position}: {error}")
            }
        }
    }
}

impl std::error::Error for CompileError {}

fn is_builtin_directive(name: &str) -> bool {
    matches!(
        name,
        DIRECTIVE_REF | DIRECTIVE_LAZY | DIRECTIVE_MODEL | DIRECTIVE_KEY
    )
}

fn is_void_tag(name: &str) -> bool {
    name.eq_ignore_ascii_case("input") || name.eq_ignore_ascii_case("img")
        || name.eq_ignore_ascii_case("br")
}

fn is_component_name(name: &str) -> bool {
    name.bytes().any(|b| b == b'-' || b.is_ascii_uppercase())
}

fn is_attr_name_byte(byte: u8) -> bool {
    byte == b'-' || byte == b':' || byte == b'@' || byte.is_ascii_alphanumeric()
}

fn find_attribute_name(text: &str) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    let start = bytes.iter().position(|&b| is_attr_name_byte(b))?;
    let mut end = start + 1;
    while bytes.get(end).copied().is_some_and(is_attr_name_byte) {
        end += 1;
    }
    Some((start, end))
}

/// `some-name` to `someName`. Only a dash before a lowercase letter folds.
fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '-' && chars.peek().is_some_and(|c| c.is_ascii_lowercase()) {
            if let Some(next) = chars.next() {
                out.push(next.to_ascii_uppercase());
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// Text that is nothing but whitespace containing a line break.
fn is_breakline(content: &str) -> bool {
    content.contains('\n') && content.trim().is_empty()
}

/// Shed one leading `spaces + newline` prefix and one trailing
/// `newline + spaces` suffix.
fn trim_breakline(content: &str) -> &str {
    let mut out = content;
    let bytes = out.as_bytes();
    let mut head = 0;
    while bytes
        .get(head)
        .copied()
        .is_some_and(|b| b == b' ' || b == b'\t')
    {
        head += 1;
    }
    if bytes.get(head) == Some(&b'\n') {
        out = &out[head + 1..];
    }
    let bytes = out.as_bytes();
    let mut tail = bytes.len();
    while tail > 0 && (bytes[tail - 1] == b' ' || bytes[tail - 1] == b'\t') {
        tail -= 1;
    }
    if tail > 0 && bytes[tail - 1] == b'\n' {
        out = &out[..tail - 1];
    }
    out
}

struct Compiler<'a> {
    template: &'a str,
    exprs: &'a ExprCache,
    root: Vec<Node>,
    stack: Vec<Node>,
    /// True while scanning between `<tag` and its `>`.
    in_tag_body: bool,
    /// Quote byte of the currently open attribute value.
    attr_quote: Option<u8>,
}

impl<'a> Compiler<'a> {
    fn new(template: &'a str, exprs: &'a ExprCache) -> Compiler<'a> {
        Compiler {
            template,
            exprs,
            root: Vec::new(),
            stack: Vec::new(),
            in_tag_body: false,
            attr_quote: None,
        }
    }

    fn locate(&self, offset: usize) -> Position {
        Position::locate(self.template, offset)
    }

    fn parse_expr(&self, source: &str, offset: usize) -> Result<Rc<weft_expr::Expr>, CompileError> {
        self.exprs
            .parse(source)
            .map_err(|error| CompileError::Expression {
                source: source.to_string(),
                error,
                position: self.locate(offset),
            })
    }

    /// A finished node joins the element attribute list while its tag
    /// body is open, otherwise the open parent, otherwise the root.
    fn attach(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(Node::Element(element)) if self.in_tag_body => element.attrs.push(node),
            Some(parent) => parent.push_child(node),
            None => self.root.push(node),
        }
    }

    fn add_text(&mut self, content: &str) {
        if is_breakline(content) {
            return;
        }
        let trimmed = trim_breakline(content);
        if trimmed.is_empty() {
            return;
        }
        self.attach(Node::Text {
            content: trimmed.to_string(),
        });
    }

    fn close(&mut self, offset: usize) -> Result<(), CompileError> {
        match self.stack.pop() {
            Some(node) => {
                if node.is_attr_level() {
                    self.attr_quote = None;
                }
                self.attach(node);
                Ok(())
            }
            None => Err(CompileError::UnexpectedBlockEnd {
                position: self.locate(offset),
            }),
        }
    }

    fn close_attr(&mut self) {
        self.attr_quote = None;
        if self.stack.last().is_some_and(Node::is_attr_level)
            && let Some(node) = self.stack.pop()
        {
            self.attach(node);
        }
    }

    fn close_branch(&mut self, branch: &str, offset: usize) -> Result<(), CompileError> {
        if !self.stack.last().is_some_and(Node::opens_branch) {
            return Err(CompileError::UnexpectedBranch {
                branch: branch.to_string(),
                position: self.locate(offset),
            });
        }
        self.close(offset)
    }

    fn enclosing_component(&self) -> bool {
        for node in self.stack.iter().rev() {
            if let Node::Element(element) = node {
                return element.component;
            }
        }
        false
    }

    fn open_attribute(&mut self, name: &str) {
        let node = if is_builtin_directive(name) {
            Node::Directive(Directive {
                name: name.to_string(),
                modifier: None,
                children: Vec::new(),
            })
        } else if let Some(event) = name.strip_prefix(DIRECTIVE_EVENT_PREFIX) {
            Node::Directive(Directive {
                name: DIRECTIVE_EVENT.to_string(),
                modifier: Some(camel_case(event)),
                children: Vec::new(),
            })
        } else if let Some(custom) = name.strip_prefix(DIRECTIVE_CUSTOM_PREFIX) {
            Node::Directive(Directive {
                name: camel_case(custom),
                modifier: None,
                children: Vec::new(),
            })
        } else {
            let name = if self.enclosing_component() {
                camel_case(name)
            } else {
                name.to_string()
            };
            Node::Attribute(Attribute {
                name,
                children: Vec::new(),
            })
        };
        self.stack.push(node);
    }

    /// Consume an attribute value from `text`. With no value open yet,
    /// `="` (or `='`) opens one; anything else closes the attribute as
    /// bare. With a value open, text up to the matching quote becomes a
    /// value part. Returns whatever remains after the value.
    fn parse_attribute(&mut self, mut text: &'a str) -> &'a str {
        if self.attr_quote.is_none() {
            let bytes = text.as_bytes();
            if bytes.first() == Some(&b'=') && matches!(bytes.get(1), Some(&b'"') | Some(&b'\'')) {
                self.attr_quote = bytes.get(1).copied();
                text = &text[2..];
            } else {
                self.close_attr();
                return text;
            }
        }
        let Some(quote) = self.attr_quote else {
            return text;
        };
        match memchr(quote, text.as_bytes()) {
            Some(index) => {
                if index > 0 {
                    self.add_text(&text[..index]);
                }
                self.close_attr();
                &text[index + 1..]
            }
            None => {
                if !text.is_empty() {
                    self.add_text(text);
                }
                ""
            }
        }
    }

    /// Split a text region on delimiter boundaries, routing the pieces
    /// by the current level: open attribute value, tag body, or plain
    /// content.
    fn parse_content(&mut self, content: &'a str, base: usize) -> Result<(), CompileError> {
        let mut helper = Scanner::new(content);
        while helper.has_next() {
            let mut text = helper.next_before(&OpeningDelimiter);
            helper.next_after(&OpeningDelimiter);
            if !text.is_empty() {
                if self.attr_quote.is_some() {
                    text = self.parse_attribute(text);
                }
                if self.in_tag_body && self.attr_quote.is_none() {
                    while !text.is_empty() {
                        let Some((start, end)) = find_attribute_name(text) else {
                            break;
                        };
                        let name = &text[start..end];
                        text = &text[end..];
                        self.open_attribute(name);
                        text = self.parse_attribute(text);
                    }
                } else if !text.is_empty() {
                    self.add_text(text);
                }
            }
            let offset = base + helper.pos();
            let source = helper.next_before(&ClosingDelimiter);
            let delimiter = helper.next_after(&ClosingDelimiter);
            if !source.is_empty() {
                if source.as_bytes()[0] == b'/' {
                    self.close(offset)?;
                } else {
                    self.parse_marker(source, delimiter, offset)?;
                }
            }
        }
        Ok(())
    }

    /// Dispatch one delimiter body by prefix; a bare expression is the
    /// fallback when nothing matches and the body is not a comment.
    fn parse_marker(
        &mut self,
        source: &str,
        delimiter: &str,
        offset: usize,
    ) -> Result<(), CompileError> {
        if let Some(rest) = source.strip_prefix(SYNTAX_EACH) {
            let rest = rest.trim();
            let (collection, index) = match rest.split_once(':') {
                Some((head, index)) => (head.trim(), Some(index.trim())),
                None => (rest, None),
            };
            if collection.is_empty() {
                return Err(CompileError::ExpectedExpression {
                    position: self.locate(offset),
                });
            }
            let expr = self.parse_expr(collection, offset)?;
            self.stack.push(Node::Each(Each {
                expr,
                index: index.filter(|name| !name.is_empty()).map(str::to_string),
                children: Vec::new(),
            }));
        } else if let Some(rest) = source.strip_prefix(SYNTAX_IMPORT) {
            let name = rest.trim();
            if name.is_empty() {
                return Err(CompileError::ExpectedExpression {
                    position: self.locate(offset),
                });
            }
            self.attach(Node::Import {
                name: name.to_string(),
            });
        } else if let Some(rest) = source.strip_prefix(SYNTAX_PARTIAL) {
            let name = rest.trim();
            if name.is_empty() {
                return Err(CompileError::ExpectedExpression {
                    position: self.locate(offset),
                });
            }
            self.stack.push(Node::Partial(Partial {
                name: name.to_string(),
                children: Vec::new(),
            }));
        } else if let Some(rest) = source.strip_prefix(SYNTAX_IF) {
            let condition = rest.trim();
            if condition.is_empty() {
                return Err(CompileError::ExpectedExpression {
                    position: self.locate(offset),
                });
            }
            let expr = self.parse_expr(condition, offset)?;
            self.stack.push(Node::If(If {
                expr,
                children: Vec::new(),
            }));
        } else if let Some(rest) = source.strip_prefix(SYNTAX_ELSE_IF) {
            let condition = rest.trim();
            if condition.is_empty() {
                return Err(CompileError::ExpectedExpression {
                    position: self.locate(offset),
                });
            }
            self.close_branch(source, offset)?;
            let expr = self.parse_expr(condition, offset)?;
            self.stack.push(Node::ElseIf(ElseIf {
                expr,
                children: Vec::new(),
            }));
        } else if source.strip_prefix(SYNTAX_ELSE).is_some() {
            self.close_branch(source, offset)?;
            self.stack.push(Node::Else(Else {
                children: Vec::new(),
            }));
        } else if let Some(rest) = source.strip_prefix(SYNTAX_SPREAD) {
            let inner = rest.trim();
            if inner.is_empty() {
                return Err(CompileError::ExpectedExpression {
                    position: self.locate(offset),
                });
            }
            let expr = self.parse_expr(inner, offset)?;
            self.attach(Node::Spread { expr });
        } else if source.starts_with(SYNTAX_COMMENT) {
            // comments contribute nothing
        } else {
            let expr = self.parse_expr(source.trim(), offset)?;
            self.attach(Node::Expression {
                expr,
                safe: !delimiter.ends_with("}}}"),
            });
        }
        Ok(())
    }
}

fn compile_with(template: &str, exprs: &ExprCache) -> Result<Vec<Node>, CompileError> {
    let mut compiler = Compiler::new(template, exprs);
    let mut main = Scanner::new(template);

    while main.has_next() {
        let start = main.pos();
        let text = main.next_before(&OpeningTag);
        if !text.is_empty() {
            compiler.parse_content(text, start)?;
        }
        if main.peek(0) != Some(b'<') {
            break;
        }
        if main.peek(1) == Some(b'/') {
            let tag = main.next_after(&OpeningTag);
            let name = &tag[2..];
            if main.peek(0) != Some(b'>') {
                return Err(CompileError::IllegalTag {
                    position: Position::locate(template, main.pos()),
                });
            }
            match compiler.stack.last() {
                Some(Node::Element(element)) if element.name == name => {}
                _ => {
                    return Err(CompileError::UnexpectedClosingTag {
                        tag: name.to_string(),
                        position: Position::locate(template, main.pos()),
                    });
                }
            }
            compiler.close(main.pos())?;
            main.forward(1);
        } else {
            let tag = main.next_after(&OpeningTag);
            let name = &tag[1..];
            let component = is_component_name(name);
            compiler.stack.push(Node::Element(Element {
                name: name.to_string(),
                component,
                attrs: Vec::new(),
                children: Vec::new(),
            }));
            compiler.in_tag_body = true;
            let body_start = main.pos();
            let body = main.next_before(&ClosingTag);
            if !body.is_empty() {
                compiler.parse_content(body, body_start)?;
            }
            if compiler.attr_quote.is_some() || compiler.stack.last().is_some_and(Node::is_attr_level)
            {
                compiler.close_attr();
            }
            let end = main.next_after(&ClosingTag);
            compiler.in_tag_body = false;
            if end.is_empty() {
                return Err(CompileError::IllegalTag {
                    position: Position::locate(template, main.pos()),
                });
            }
            if component || is_void_tag(name) || end.as_bytes()[0] == b'/' {
                compiler.close(main.pos())?;
            }
        }
    }

    if let Some(open) = compiler.stack.first() {
        let name = match open {
            Node::Element(element) => element.name.clone(),
            other => other.kind().to_string(),
        };
        return Err(CompileError::UnclosedBlock {
            name,
            position: Position::locate(template, template.len()),
        });
    }

    let mut nodes = compiler.root;
    if nodes.is_empty() {
        nodes.push(Node::Text {
            content: template.to_string(),
        });
    }
    Ok(nodes)
}

/// Compile one template with a private expression cache.
pub fn compile(template: &str) -> Result<Vec<Node>, CompileError> {
    compile_with(template, &ExprCache::new())
}

/// Compile cache keyed by exact template text. Expressions are cached
/// separately so identical bindings share one tree across templates.
///
/// Only successful compiles are cached.
#[derive(Debug, Default)]
pub struct TemplateCache {
    entries: RefCell<AHashMap<String, Rc<Vec<Node>>>>,
    exprs: ExprCache,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile(&self, template: &str) -> Result<Rc<Vec<Node>>, CompileError> {
        if let Some(hit) = self.entries.borrow().get(template) {
            trace!(template, "template cache hit");
            return Ok(Rc::clone(hit));
        }
        let nodes = Rc::new(compile_with(template, &self.exprs)?);
        self.entries
            .borrow_mut()
            .insert(template.to_string(), Rc::clone(&nodes));
        Ok(nodes)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(template: &str) -> Node {
        let mut nodes = compile(template).unwrap();
        assert_eq!(nodes.len(), 1, "expected a single root node");
        nodes.remove(0)
    }

    fn element(node: Node) -> Element {
        match node {
            Node::Element(element) => element,
            other => panic!("expected element, got {}", other.kind()),
        }
    }

    #[test]
    fn plain_text_compiles_to_text_node() {
        assert_eq!(
            one("hello"),
            Node::Text {
                content: "hello".into()
            }
        );
    }

    #[test]
    fn element_with_attributes() {
        let div = element(one(r#"<div id="app" class="box"></div>"#));
        assert_eq!(div.name, "div");
        assert!(!div.component);
        assert_eq!(div.attrs.len(), 2);
        match &div.attrs[0] {
            Node::Attribute(attr) => {
                assert_eq!(attr.name, "id");
                assert_eq!(
                    attr.children,
                    vec![Node::Text {
                        content: "app".into()
                    }]
                );
            }
            other => panic!("expected attribute, got {}", other.kind()),
        }
    }

    #[test]
    fn attribute_value_mixes_text_and_expressions() {
        let a = element(one(r#"<a href="/user/{{id}}">x</a>"#));
        let Node::Attribute(href) = &a.attrs[0] else {
            panic!("expected attribute");
        };
        assert_eq!(href.children.len(), 2);
        assert_eq!(
            href.children[0],
            Node::Text {
                content: "/user/".into()
            }
        );
        assert!(matches!(
            href.children[1],
            Node::Expression { safe: true, .. }
        ));
    }

    #[test]
    fn bare_attribute_has_no_value_parts() {
        let div = element(one(r#"<div hidden class="x"></div>"#));
        let Node::Attribute(hidden) = &div.attrs[0] else {
            panic!("expected attribute");
        };
        assert_eq!(hidden.name, "hidden");
        assert!(hidden.children.is_empty());
        assert!(matches!(&div.attrs[1], Node::Attribute(a) if a.name == "class"));
    }

    #[test]
    fn expression_child_is_escaped_by_default() {
        let p = element(one("<p>{{name}}</p>"));
        assert!(matches!(
            p.children[0],
            Node::Expression { safe: true, .. }
        ));
    }

    #[test]
    fn triple_brace_marks_expression_unsafe() {
        let node = one("{{{html}}}");
        assert!(matches!(node, Node::Expression { safe: false, .. }));
    }

    #[test]
    fn if_chain_compiles_to_sibling_branches() {
        let nodes = compile("{{#if a}}x{{else if b}}y{{else}}z{{/if}}").unwrap();
        assert_eq!(nodes.len(), 3);
        assert!(matches!(&nodes[0], Node::If(n) if n.children.len() == 1));
        assert!(matches!(&nodes[1], Node::ElseIf(n) if n.children.len() == 1));
        assert!(matches!(&nodes[2], Node::Else(n) if n.children.len() == 1));
    }

    #[test]
    fn each_captures_collection_and_index_name() {
        let node = one("{{#each list:i}}{{this}}{{/each}}");
        let Node::Each(each) = node else {
            panic!("expected each");
        };
        assert_eq!(each.expr.to_source(), "list");
        assert_eq!(each.index.as_deref(), Some("i"));
        assert_eq!(each.children.len(), 1);
    }

    #[test]
    fn directive_spellings() {
        let button = element(one(
            r#"<button on-click="add(1)" o-tool-tip="hint" ref="btn">Go</button>"#,
        ));
        let Node::Directive(event) = &button.attrs[0] else {
            panic!("expected directive");
        };
        assert_eq!(event.name, "event");
        assert_eq!(event.modifier.as_deref(), Some("click"));
        assert_eq!(
            event.children,
            vec![Node::Text {
                content: "add(1)".into()
            }]
        );
        let Node::Directive(custom) = &button.attrs[1] else {
            panic!("expected directive");
        };
        assert_eq!(custom.name, "toolTip");
        assert!(custom.modifier.is_none());
        let Node::Directive(reference) = &button.attrs[2] else {
            panic!("expected directive");
        };
        assert_eq!(reference.name, "ref");
    }

    #[test]
    fn component_tags_self_close_and_camel_case_attrs() {
        let nodes = compile(r#"<My-Widget data-id="7">"#).unwrap();
        let widget = element(nodes.into_iter().next().unwrap());
        assert!(widget.component);
        assert!(matches!(&widget.attrs[0], Node::Attribute(a) if a.name == "dataId"));
        assert!(widget.children.is_empty());
    }

    #[test]
    fn void_and_slash_tags_self_close() {
        let nodes = compile(r#"<ul><br><input type="text"><li/></ul>"#).unwrap();
        let ul = element(nodes.into_iter().next().unwrap());
        assert_eq!(ul.children.len(), 3);
        assert!(matches!(&ul.children[0], Node::Element(e) if e.name == "br"));
        assert!(matches!(&ul.children[1], Node::Element(e) if e.name == "input"));
        assert!(matches!(&ul.children[2], Node::Element(e) if e.name == "li"));
    }

    #[test]
    fn spread_in_tag_body_lands_in_attrs() {
        let div = element(one("<div {{...props}}></div>"));
        assert!(matches!(&div.attrs[0], Node::Spread { .. }));
    }

    #[test]
    fn partial_and_import() {
        let nodes = compile("{{#partial row}}<li>x</li>{{/partial}}{{>row}}").unwrap();
        assert_eq!(nodes.len(), 2);
        let Node::Partial(partial) = &nodes[0] else {
            panic!("expected partial");
        };
        assert_eq!(partial.name, "row");
        assert_eq!(partial.children.len(), 1);
        assert_eq!(
            nodes[1],
            Node::Import {
                name: "row".into()
            }
        );
    }

    #[test]
    fn comments_compile_away() {
        let p = element(one("<p>{{: note to self}}x</p>"));
        assert_eq!(
            p.children,
            vec![Node::Text {
                content: "x".into()
            }]
        );
    }

    #[test]
    fn breakline_only_text_is_dropped() {
        let ul = element(one("<ul>\n  <li>a</li>\n</ul>"));
        assert_eq!(ul.children.len(), 1);
        let li = match &ul.children[0] {
            Node::Element(e) => e,
            other => panic!("expected element, got {}", other.kind()),
        };
        assert_eq!(
            li.children,
            vec![Node::Text {
                content: "a".into()
            }]
        );
    }

    #[test]
    fn text_sheds_indentation_line_breaks() {
        let div = element(one("<div>\n  first line\n</div>"));
        assert_eq!(
            div.children,
            vec![Node::Text {
                content: "  first line".into()
            }]
        );
    }

    #[test]
    fn conditional_attribute_blocks() {
        let div = element(one(r#"<div {{#if on}}class="lit"{{/if}}></div>"#));
        let Node::If(branch) = &div.attrs[0] else {
            panic!("expected if in attrs");
        };
        assert!(matches!(&branch.children[0], Node::Attribute(a) if a.name == "class"));
    }

    #[test]
    fn unclosed_tag_is_an_error() {
        let err = compile("<div><p>text</p>").unwrap_err();
        assert!(matches!(
            err,
            CompileError::UnclosedBlock { ref name, .. } if name == "div"
        ));
    }

    #[test]
    fn mismatched_closing_tag_is_an_error() {
        let err = compile("<div></span>").unwrap_err();
        assert!(matches!(
            err,
            CompileError::UnexpectedClosingTag { ref tag, .. } if tag == "span"
        ));
    }

    #[test]
    fn dangling_else_is_an_error() {
        let err = compile("{{else}}x{{/if}}").unwrap_err();
        assert!(matches!(err, CompileError::UnexpectedBranch { .. }));
    }

    #[test]
    fn empty_condition_is_an_error() {
        let err = compile("{{#if}}x{{/if}}").unwrap_err();
        assert!(matches!(err, CompileError::ExpectedExpression { .. }));
    }

    #[test]
    fn broken_expression_reports_position() {
        let err = compile("line one\n{{1 +}}").unwrap_err();
        let CompileError::Expression { position, .. } = err else {
            panic!("expected expression error");
        };
        assert_eq!(position.line, 2);
    }

    #[test]
    fn block_close_with_nothing_open_is_an_error() {
        let err = compile("{{/if}}").unwrap_err();
        assert!(matches!(err, CompileError::UnexpectedBlockEnd { .. }));
    }

    #[test]
    fn cache_returns_shared_forest() {
        let cache = TemplateCache::new();
        let first = cache.compile("<p>{{a}}</p>").unwrap();
        let second = cache.compile("<p>{{a}}</p>").unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn cache_does_not_store_failures() {
        let cache = TemplateCache::new();
        assert!(cache.compile("<div>").is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn position_locates_line_and_column() {
        let position = Position::locate("ab\ncde\nf", 5);
        assert_eq!(position.line, 2);
        assert_eq!(position.column, 3);
    }
}
